//! 运行时配置管理
//!
//! 支持YAML配置文件驱动的插件运行时

use crate::core::worker_pool::WorkerPoolConfig;
use crate::plugins::packaging::DEFAULT_PACKAGE_EXTENSION;
use crate::{NotepadError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 运行时配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 插件目录与状态文件
    pub plugins: PluginSettings,
    /// 工作线程池
    pub worker_pool: WorkerPoolSettings,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 插件目录设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// 插件包所在目录
    pub plugin_dir: PathBuf,
    /// 插件状态文件
    pub state_file: PathBuf,
    /// 插件包扩展名（不含点）
    pub package_extension: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("plugins"),
            state_file: PathBuf::from("plugins.json"),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
        }
    }
}

/// 工作线程池设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolSettings {
    /// 工作线程数，未设置时按CPU核数
    pub worker_threads: Option<usize>,
    /// 阻塞任务线程上限
    pub max_blocking_threads: usize,
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_blocking_threads: 64,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
}

/// 日志级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl RuntimeConfig {
    /// 以指定目录为根的配置（插件目录与状态文件都位于其下）
    pub fn for_directory<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            plugins: PluginSettings {
                plugin_dir: root.join("plugins"),
                state_file: root.join("plugins.json"),
                ..PluginSettings::default()
            },
            ..Self::default()
        }
    }

    /// 工作线程池配置
    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        let defaults = WorkerPoolConfig::default();
        WorkerPoolConfig {
            worker_threads: self.worker_pool.worker_threads.unwrap_or(defaults.worker_threads),
            max_blocking_threads: self.worker_pool.max_blocking_threads,
            ..defaults
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.plugins.plugin_dir.as_os_str().is_empty() {
            return Err(NotepadError::config("Plugin directory cannot be empty"));
        }

        if self.plugins.state_file.as_os_str().is_empty() {
            return Err(NotepadError::config("State file path cannot be empty"));
        }

        let extension = &self.plugins.package_extension;
        if extension.is_empty() {
            return Err(NotepadError::config("Package extension cannot be empty"));
        }
        if extension.contains('.') {
            return Err(NotepadError::config(
                "Package extension must not contain a dot",
            ));
        }

        if self.worker_pool.worker_threads == Some(0) {
            return Err(NotepadError::config("Worker threads must be positive"));
        }
        if self.worker_pool.max_blocking_threads == 0 {
            return Err(NotepadError::config("Max blocking threads must be positive"));
        }

        Ok(())
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: RuntimeConfig,
}

impl ConfigManager {
    /// 从文件加载配置
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NotepadError::config(&format!("Failed to read config file: {}", e)))?;

        let config: RuntimeConfig = serde_yaml::from_str(&content)
            .map_err(|e| NotepadError::config(&format!("Failed to parse config file: {}", e)))?;

        Ok(Self { config })
    }

    /// 创建默认配置
    pub fn new_default() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    pub fn from_config(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// 保存配置到文件
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self.config)
            .map_err(|e| NotepadError::config(&format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| NotepadError::config(&format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// 获取配置
    pub fn get_config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.config
    }

    pub fn into_config(self) -> RuntimeConfig {
        self.config
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        tracing::info!("Configuration validation passed");
        Ok(())
    }
}

/// 生成默认配置文件
pub async fn generate_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let config_manager = ConfigManager::new_default();
    config_manager.save_to_file(path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_manager_default() {
        let config_manager = ConfigManager::new_default();
        let config = config_manager.get_config();

        assert_eq!(config.plugins.plugin_dir, PathBuf::from("plugins"));
        assert_eq!(config.plugins.package_extension, "npk");
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config_manager.validate().is_ok());
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notepad_runtime.yaml");

        let mut config = RuntimeConfig::for_directory(temp_dir.path());
        config.worker_pool.worker_threads = Some(3);
        config.logging.level = LogLevel::Debug;
        ConfigManager::from_config(config.clone())
            .save_to_file(&path)
            .await
            .unwrap();

        let loaded = ConfigManager::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.get_config(), &config);
    }

    #[tokio::test]
    async fn test_generate_default_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("default.yaml");
        generate_default_config_file(&path).await.unwrap();

        let loaded = ConfigManager::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.get_config(), &RuntimeConfig::default());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "plugins:\n  plugin_dir: /opt/notepad/plugins\nlogging:\n  level: warn\n";
        let config: RuntimeConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.plugins.plugin_dir, PathBuf::from("/opt/notepad/plugins"));
        assert_eq!(config.plugins.state_file, PathBuf::from("plugins.json"));
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(tracing::Level::from(config.logging.level), tracing::Level::WARN);
    }

    #[test]
    fn test_validation_rules() {
        let mut config = RuntimeConfig::default();
        config.plugins.package_extension = ".npk".to_string();
        assert!(matches!(config.validate(), Err(NotepadError::Config { .. })));

        let mut config = RuntimeConfig::default();
        config.plugins.package_extension.clear();
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.worker_pool.worker_threads = Some(0);
        assert!(config.validate().is_err());

        let mut config = RuntimeConfig::default();
        config.plugins.state_file = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_pool_config_mapping() {
        let mut config = RuntimeConfig::default();
        config.worker_pool.worker_threads = Some(5);
        config.worker_pool.max_blocking_threads = 8;

        let pool_config = config.worker_pool_config();
        assert_eq!(pool_config.worker_threads, 5);
        assert_eq!(pool_config.max_blocking_threads, 8);
        assert_eq!(pool_config.thread_name, "plugin-worker");
    }
}
