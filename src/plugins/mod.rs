//! 插件运行时模块
//!
//! 插件包检查 → 插件加载 → 插件注册表 ← 生命周期管理器 → 状态持久化。
//! 宿主应用只调用 [`PluginManager`]，不直接访问注册表或加载器。

pub mod core;
pub mod packaging;
pub mod inspector;
pub mod loader;
pub mod registry;
pub mod persistence;
pub mod manager;
pub mod builtin;

// 重新导出核心组件
pub use self::core::*;
pub use self::packaging::{PackageBuilder, PackageManifest, DEFAULT_PACKAGE_EXTENSION, DESCRIPTOR_FILE};
pub use self::loader::{LoaderStatistics, PluginFactory, PluginLoader};
pub use self::registry::PluginRegistry;
pub use self::persistence::{PluginSeed, PluginStateStore};
pub use self::manager::{InitializationReport, PluginManager, RestoreReport, RuntimeStatistics};
