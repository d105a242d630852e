//! Notepad 插件运行时错误处理
//!
//! 统一的错误类型和错误处理机制

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 运行时统一错误类型
#[derive(Error, Debug)]
pub enum NotepadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid plugin package {path:?}: {message}")]
    InvalidPackage { path: PathBuf, message: String },

    #[error("Failed to load entry point '{entry_point}': {message}")]
    LoadFailure { entry_point: String, message: String },

    #[error("Plugin '{name}' by '{author}' is already installed")]
    DuplicateInstall { name: String, author: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Plugin '{plugin}' failed: {message}")]
    PluginRuntime { plugin: String, message: String },

    #[error("Plugin not found: {plugin}")]
    PluginNotFound { plugin: String },

    #[error("Invalid plugin state: {message}")]
    InvalidState { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },
}

impl NotepadError {
    /// 创建插件包无效错误
    pub fn invalid_package(path: &Path, message: &str) -> Self {
        Self::InvalidPackage {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// 创建加载失败错误
    pub fn load_failure(entry_point: &str, message: &str) -> Self {
        Self::LoadFailure {
            entry_point: entry_point.to_string(),
            message: message.to_string(),
        }
    }

    /// 创建持久化错误
    pub fn persistence(message: &str) -> Self {
        Self::Persistence {
            message: message.to_string(),
        }
    }

    /// 创建插件运行错误
    pub fn plugin_runtime(plugin: &str, message: &str) -> Self {
        Self::PluginRuntime {
            plugin: plugin.to_string(),
            message: message.to_string(),
        }
    }

    /// 创建插件未找到错误
    pub fn plugin_not_found(plugin: &str) -> Self {
        Self::PluginNotFound {
            plugin: plugin.to_string(),
        }
    }

    /// 创建状态错误
    pub fn invalid_state(message: &str) -> Self {
        Self::InvalidState {
            message: message.to_string(),
        }
    }

    /// 创建配置错误
    pub fn config(message: &str) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// 创建工作线程池错误
    pub fn worker_pool(message: &str) -> Self {
        Self::WorkerPool {
            message: message.to_string(),
        }
    }

    /// 是否属于插件代码自身的运行错误
    pub fn is_plugin_runtime(&self) -> bool {
        matches!(self, Self::PluginRuntime { .. })
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, NotepadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = NotepadError::persistence("disk full");
        assert!(matches!(error, NotepadError::Persistence { .. }));
        assert_eq!(error.to_string(), "Persistence error: disk full");
    }

    #[test]
    fn test_invalid_package_message() {
        let error = NotepadError::invalid_package(Path::new("plugins/a.npk"), "missing descriptor");
        assert!(error.to_string().contains("a.npk"));
        assert!(error.to_string().contains("missing descriptor"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error = NotepadError::from(io_error);
        assert!(matches!(error, NotepadError::Io(_)));
    }

    #[test]
    fn test_plugin_runtime_classification() {
        assert!(NotepadError::plugin_runtime("Counter (A)", "boom").is_plugin_runtime());
        assert!(!NotepadError::load_failure("demo.counter", "not registered").is_plugin_runtime());
    }
}
