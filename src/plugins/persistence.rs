//! 插件状态持久化
//!
//! 将注册表中的插件列表（名称、作者、版本、分类、启用标志）按注册顺序
//! 写入 JSON 文件，启动时读回。写入先落到临时文件再重命名。

use super::core::PluginInfo;
use crate::types::PluginKey;
use crate::{NotepadError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 持久化的插件记录，不携带实例
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSeed {
    pub name: String,
    pub author: String,
    pub version: String,
    pub category: String,
    pub enabled: bool,
}

impl PluginSeed {
    pub fn key(&self) -> PluginKey {
        PluginKey::new(self.name.clone(), self.author.clone())
    }
}

impl From<&PluginInfo> for PluginSeed {
    fn from(info: &PluginInfo) -> Self {
        Self {
            name: info.name.clone(),
            author: info.author.clone(),
            version: info.version.clone(),
            category: info.category.clone(),
            enabled: info.enabled,
        }
    }
}

/// 插件状态文件
#[derive(Debug, Clone)]
pub struct PluginStateStore {
    path: PathBuf,
}

impl PluginStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入注册表中的全部插件
    pub fn write(&self, infos: &[PluginInfo]) -> Result<()> {
        let seeds: Vec<PluginSeed> = infos.iter().map(PluginSeed::from).collect();
        self.write_seeds(&seeds)
    }

    pub fn write_seeds(&self, seeds: &[PluginSeed]) -> Result<()> {
        let mut json = serde_json::to_string_pretty(seeds)?;
        json.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json.as_bytes()).map_err(|e| self.write_error(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| self.write_error(e))?;

        debug!(path = %self.path.display(), plugins = seeds.len(), "Plugin state written");
        Ok(())
    }

    /// 读取插件记录，文件不存在时返回空列表
    pub fn try_read(&self) -> Result<Vec<PluginSeed>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(NotepadError::persistence(&format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            NotepadError::persistence(&format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// 读取插件记录，读取或解析失败时视为没有已安装插件
    pub fn read(&self) -> Vec<PluginSeed> {
        match self.try_read() {
            Ok(seeds) => seeds,
            Err(e) => {
                warn!("{}; starting with no plugins", e);
                Vec::new()
            }
        }
    }

    fn write_error(&self, error: std::io::Error) -> NotepadError {
        NotepadError::persistence(&format!("failed to write {}: {}", self.path.display(), error))
    }
}
