//! 插件系统核心定义
//!
//! 定义插件能力契约（initialize/execute/shutdown）、插件信息和生命周期事件

use crate::types::{now_ns, PluginKey, TimestampNs};
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// 插件能力契约 - 每个插件入口点都必须实现
///
/// 插件代码不可抢占：`initialize` 与 `execute` 在工作线程池的阻塞线程上运行，
/// 返回的错误和发生的 panic 都会在管理器边界被捕获。
pub trait EditorPlugin: Send {
    /// 初始化插件
    fn initialize(&mut self) -> Result<()>;

    /// 执行插件
    fn execute(&mut self) -> Result<()>;

    /// 释放插件资源（禁用、卸载或运行时关闭时调用）
    fn shutdown(&mut self) {}
}

/// 已加载插件实例的共享句柄
pub type PluginHandle = Arc<Mutex<Box<dyn EditorPlugin>>>;

/// 插件生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginState {
    /// 已安装，未启用
    Disabled,
    /// 已安装，已启用
    Enabled,
    /// 执行中（启用状态的瞬时子状态）
    Executing,
    /// 已卸载（终态）
    Uninstalled,
}

/// 插件信息
///
/// `instance` 仅在插件已加载且启用时存在
#[derive(Clone)]
pub struct PluginInfo {
    pub name: String,
    pub author: String,
    pub version: String,
    pub category: String,
    /// 插件声明的入口点标识
    pub entry_point: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// 插件包在磁盘上的位置
    pub package_path: PathBuf,
    pub instance: Option<PluginHandle>,
}

impl PluginInfo {
    /// 插件身份
    pub fn key(&self) -> PluginKey {
        PluginKey::new(self.name.clone(), self.author.clone())
    }

    pub fn matches(&self, key: &PluginKey) -> bool {
        self.name == key.name && self.author == key.author
    }

    /// 不含插件实例的副本
    pub fn snapshot(&self) -> PluginInfo {
        PluginInfo {
            instance: None,
            ..self.clone()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.instance.is_some()
    }

    /// 当前生命周期状态（不含执行中子状态）
    pub fn state(&self) -> PluginState {
        if self.enabled {
            PluginState::Enabled
        } else {
            PluginState::Disabled
        }
    }
}

impl fmt::Debug for PluginInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInfo")
            .field("name", &self.name)
            .field("author", &self.author)
            .field("version", &self.version)
            .field("category", &self.category)
            .field("entry_point", &self.entry_point)
            .field("enabled", &self.enabled)
            .field("package_path", &self.package_path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// 插件生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEvent {
    pub key: PluginKey,
    pub kind: PluginEventKind,
    pub timestamp: TimestampNs,
}

impl PluginEvent {
    pub fn new(key: PluginKey, kind: PluginEventKind) -> Self {
        Self {
            key,
            kind,
            timestamp: now_ns(),
        }
    }
}

/// 事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEventKind {
    Installed,
    Enabled,
    Disabled,
    Executed,
    Uninstalled,
    /// 插件加载或插件代码运行失败（非致命）
    Failed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopPlugin;

    impl EditorPlugin for NoopPlugin {
        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn execute(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn sample_info() -> PluginInfo {
        PluginInfo {
            name: "Counter".to_string(),
            author: "A".to_string(),
            version: "1.0.0".to_string(),
            category: "tools".to_string(),
            entry_point: "demo.counter".to_string(),
            description: None,
            enabled: false,
            package_path: PathBuf::from("plugins/counter.npk"),
            instance: None,
        }
    }

    #[test]
    fn test_plugin_info_identity_and_state() {
        let mut info = sample_info();
        assert_eq!(info.key(), PluginKey::new("Counter", "A"));
        assert!(info.matches(&PluginKey::new("Counter", "A")));
        assert!(!info.matches(&PluginKey::new("Counter", "B")));
        assert_eq!(info.state(), PluginState::Disabled);

        let handle: PluginHandle = Arc::new(Mutex::new(Box::new(NoopPlugin)));
        info.instance = Some(handle);
        info.enabled = true;
        assert!(info.is_loaded());
        assert_eq!(info.state(), PluginState::Enabled);
    }

    #[test]
    fn test_snapshot_drops_instance() {
        let mut info = sample_info();
        info.enabled = true;
        info.instance = Some(Arc::new(Mutex::new(Box::new(NoopPlugin))));

        let snapshot = info.snapshot();
        assert!(!snapshot.is_loaded());
        assert!(snapshot.enabled);
        assert_eq!(snapshot.key(), info.key());
        assert!(info.is_loaded());
    }

    #[test]
    fn test_debug_hides_instance() {
        let rendered = format!("{:?}", sample_info());
        assert!(rendered.contains("Counter"));
        assert!(rendered.contains("loaded: false"));
    }
}
