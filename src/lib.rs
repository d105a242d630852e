//! Notepad 插件运行时
//!
//! 桌面文本编辑器的插件子系统：发现外部插件包，在受管目录中安装和移除插件，
//! 管理插件生命周期（加载 → 启用/禁用 → 执行 → 卸载），并在重启之间持久化插件状态。
//! 所有耗时操作都在共享工作线程池上完成，不阻塞界面线程。
//!
//! # 架构分层
//!
//! - **插件层**: 插件包检查、加载器、注册表、状态持久化与生命周期管理器
//! - **核心基础层**: 共享工作线程池
//! - **配置层**: YAML 配置与日志初始化
//!
//! # 快速开始
//!
//! ```no_run
//! use notepad_runtime::{PluginKey, PluginLoader, PluginManager, RuntimeConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> notepad_runtime::Result<()> {
//! let loader = Arc::new(PluginLoader::new());
//! notepad_runtime::plugins::builtin::register_builtin_factories(&loader);
//!
//! let manager = PluginManager::new(RuntimeConfig::default(), loader)?;
//! manager.start().await?;
//! manager.initialize_all().await;
//!
//! let key = PluginKey::new("Counter", "Notepad");
//! manager.enable(&key).await?;
//! manager.execute(&key).await?;
//! manager.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod error;
pub mod core;
pub mod plugins;
pub mod config;

// 重新导出核心类型
pub use types::{now_ns, PluginKey, TimestampNs};
pub use error::{NotepadError, Result};
pub use self::core::worker_pool::{PoolStatistics, WorkerPool, WorkerPoolConfig};
pub use plugins::{
    EditorPlugin, InitializationReport, PluginEvent, PluginEventKind, PluginHandle, PluginInfo,
    PluginLoader, PluginManager, PluginState, RestoreReport, RuntimeStatistics,
};
pub use config::{ConfigManager, LogLevel, RuntimeConfig};

/// 运行时信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const RUNTIME_NAME: &str = "Notepad Plugin Runtime";

/// 初始化日志系统
///
/// 全局订阅者只能安装一次，重复调用返回配置错误
pub fn init_logging(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_target(false)
        .try_init()
        .map_err(|e| NotepadError::config(&format!("Failed to install log subscriber: {}", e)))?;

    tracing::info!("Initializing {} v{}", RUNTIME_NAME, VERSION);
    Ok(())
}
