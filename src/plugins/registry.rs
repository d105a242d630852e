//! 插件注册表
//!
//! 已安装插件的内存存储：按安装顺序保存插件信息，并维护分类索引。
//! 注册表本身不做同步，所有修改由生命周期管理器在锁内串行完成。

use super::core::{PluginHandle, PluginInfo};
use crate::types::PluginKey;
use crate::{NotepadError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// 插件注册表
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// 已安装插件（按安装顺序）
    plugins: Vec<PluginInfo>,
    /// 分类索引：分类 -> 插件名称列表
    category_index: BTreeMap<String, Vec<String>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加插件，身份重复时拒绝
    pub fn add(&mut self, info: PluginInfo) -> Result<()> {
        if self.contains(&info.key()) {
            return Err(NotepadError::DuplicateInstall {
                name: info.name.clone(),
                author: info.author.clone(),
            });
        }

        self.category_index
            .entry(info.category.clone())
            .or_default()
            .push(info.name.clone());
        debug!(plugin = %info.key(), category = %info.category, "Registered plugin");
        self.plugins.push(info);
        Ok(())
    }

    /// 移除插件并更新分类索引
    pub fn remove(&mut self, key: &PluginKey) -> Option<PluginInfo> {
        let position = self.plugins.iter().position(|info| info.matches(key))?;
        let info = self.plugins.remove(position);

        if let Some(names) = self.category_index.get_mut(&info.category) {
            // 不同作者的插件可以同名，只移除一个条目
            if let Some(index) = names.iter().position(|name| *name == info.name) {
                names.remove(index);
            }
            if names.is_empty() {
                self.category_index.remove(&info.category);
            }
        }

        debug!(plugin = %key, "Unregistered plugin");
        Some(info)
    }

    pub fn find(&self, key: &PluginKey) -> Option<&PluginInfo> {
        self.plugins.iter().find(|info| info.matches(key))
    }

    pub fn find_mut(&mut self, key: &PluginKey) -> Option<&mut PluginInfo> {
        self.plugins.iter_mut().find(|info| info.matches(key))
    }

    pub fn contains(&self, key: &PluginKey) -> bool {
        self.find(key).is_some()
    }

    /// 所有插件（按安装顺序）
    pub fn all(&self) -> &[PluginInfo] {
        &self.plugins
    }

    /// 已启用的插件
    pub fn enabled(&self) -> impl Iterator<Item = &PluginInfo> {
        self.plugins.iter().filter(|info| info.enabled)
    }

    pub fn by_category(&self) -> &BTreeMap<String, Vec<String>> {
        &self.category_index
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 设置插件实例，同时维护 `enabled` 与实例存在性一致
    ///
    /// 返回被替换的旧实例
    pub fn set_instance(
        &mut self,
        key: &PluginKey,
        instance: Option<PluginHandle>,
    ) -> Result<Option<PluginHandle>> {
        let info = self
            .find_mut(key)
            .ok_or_else(|| NotepadError::plugin_not_found(&key.to_string()))?;
        info.enabled = instance.is_some();
        Ok(std::mem::replace(&mut info.instance, instance))
    }

    /// 仅修改启用标志（启动恢复时实例尚未加载）
    pub fn mark_enabled(&mut self, key: &PluginKey, enabled: bool) -> Result<()> {
        let info = self
            .find_mut(key)
            .ok_or_else(|| NotepadError::plugin_not_found(&key.to_string()))?;
        info.enabled = enabled;
        Ok(())
    }
}
