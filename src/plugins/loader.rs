//! 插件加载器
//!
//! 将插件包路径与入口点标识解析为实现能力契约的插件实例。
//! 入口点通过命名工厂函数表解析，宿主在启动时注册可用的入口点。

use super::core::{EditorPlugin, PluginHandle};
use super::inspector;
use crate::{NotepadError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// 插件工厂函数
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn EditorPlugin> + Send + Sync>;

/// 加载器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderStatistics {
    pub registered_entry_points: usize,
    pub successful_loads: u64,
    pub failed_loads: u64,
}

/// 插件加载器
pub struct PluginLoader {
    /// 入口点工厂表
    factories: RwLock<HashMap<String, PluginFactory>>,
    successful_loads: AtomicU64,
    failed_loads: AtomicU64,
}

impl PluginLoader {
    /// 创建新的插件加载器
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            successful_loads: AtomicU64::new(0),
            failed_loads: AtomicU64::new(0),
        }
    }

    /// 注册入口点工厂，重复注册会替换已有工厂
    pub fn register_factory<F>(&self, entry_point: &str, factory: F)
    where
        F: Fn() -> Box<dyn EditorPlugin> + Send + Sync + 'static,
    {
        let replaced = self
            .factories
            .write()
            .insert(entry_point.to_string(), Arc::new(factory))
            .is_some();
        info!(entry_point, replaced, "Registered plugin entry point");
    }

    /// 注销入口点工厂
    pub fn unregister_factory(&self, entry_point: &str) -> bool {
        self.factories.write().remove(entry_point).is_some()
    }

    pub fn has_entry_point(&self, entry_point: &str) -> bool {
        self.factories.read().contains_key(entry_point)
    }

    /// 已注册的入口点（已排序）
    pub fn entry_points(&self) -> Vec<String> {
        let mut entry_points: Vec<String> = self.factories.read().keys().cloned().collect();
        entry_points.sort();
        entry_points
    }

    /// 加载插件
    ///
    /// 重新读取插件包（检查之后插件包可能已被删除或替换），
    /// 确认其仍声明该入口点，然后通过工厂创建新实例。
    pub fn load(&self, package_path: &Path, entry_point: &str) -> Result<PluginHandle> {
        let result = self.load_inner(package_path, entry_point);
        match &result {
            Ok(_) => {
                self.successful_loads.fetch_add(1, Ordering::Relaxed);
                debug!(entry_point, package = %package_path.display(), "Plugin instance created");
            }
            Err(e) => {
                self.failed_loads.fetch_add(1, Ordering::Relaxed);
                debug!(entry_point, package = %package_path.display(), "Plugin load failed: {}", e);
            }
        }
        result
    }

    fn load_inner(&self, package_path: &Path, entry_point: &str) -> Result<PluginHandle> {
        let declared = inspector::inspect(package_path).map_err(|e| {
            NotepadError::load_failure(entry_point, &format!("package unreadable at load time: {}", e))
        })?;

        if declared.entry_point != entry_point {
            return Err(NotepadError::load_failure(
                entry_point,
                &format!("package now declares entry point '{}'", declared.entry_point),
            ));
        }

        let factory = self
            .factories
            .read()
            .get(entry_point)
            .cloned()
            .ok_or_else(|| NotepadError::load_failure(entry_point, "entry point is not registered"))?;

        let instance = panic::catch_unwind(AssertUnwindSafe(|| factory()))
            .map_err(|_| NotepadError::load_failure(entry_point, "plugin factory panicked"))?;

        Ok(Arc::new(Mutex::new(instance)))
    }

    /// 获取加载器统计信息
    pub fn statistics(&self) -> LoaderStatistics {
        LoaderStatistics {
            registered_entry_points: self.factories.read().len(),
            successful_loads: self.successful_loads.load(Ordering::Relaxed),
            failed_loads: self.failed_loads.load(Ordering::Relaxed),
        }
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::packaging::{PackageBuilder, PackageManifest};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct TallyPlugin {
        executions: Arc<AtomicUsize>,
    }

    impl EditorPlugin for TallyPlugin {
        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn execute(&mut self) -> Result<()> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn write_package(dir: &Path, entry_point: &str) -> std::path::PathBuf {
        PackageBuilder::new(PackageManifest::new("Tally", "A", "tools", entry_point))
            .write_to(&dir.join("tally.npk"))
            .unwrap()
    }

    #[test]
    fn test_inspect_then_load_yields_working_handle() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "demo.tally");
        let executions = Arc::new(AtomicUsize::new(0));

        let loader = PluginLoader::new();
        let shared = executions.clone();
        loader.register_factory("demo.tally", move || {
            Box::new(TallyPlugin {
                executions: shared.clone(),
            })
        });

        let info = inspector::inspect(&path).unwrap();
        let handle = loader.load(&info.package_path, &info.entry_point).unwrap();
        {
            let mut plugin = handle.lock();
            plugin.initialize().unwrap();
            plugin.execute().unwrap();
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(loader.statistics().successful_loads, 1);
    }

    #[test]
    fn test_unregistered_entry_point_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "demo.unknown");
        let loader = PluginLoader::new();

        match loader.load(&path, "demo.unknown") {
            Err(NotepadError::LoadFailure { entry_point, message }) => {
                assert_eq!(entry_point, "demo.unknown");
                assert!(message.contains("not registered"));
            }
            other => panic!("Expected LoadFailure, got {:?}", other.map(|_| ())),
        }
        assert_eq!(loader.statistics().failed_loads, 1);
    }

    #[test]
    fn test_package_removed_before_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "demo.tally");
        std::fs::remove_file(&path).unwrap();

        let loader = PluginLoader::new();
        loader.register_factory("demo.tally", || {
            Box::new(TallyPlugin {
                executions: Arc::new(AtomicUsize::new(0)),
            })
        });

        assert!(matches!(
            loader.load(&path, "demo.tally"),
            Err(NotepadError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_entry_point_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_package(temp_dir.path(), "demo.other");
        let loader = PluginLoader::new();
        loader.register_factory("demo.tally", || {
            Box::new(TallyPlugin {
                executions: Arc::new(AtomicUsize::new(0)),
            })
        });

        match loader.load(&path, "demo.tally") {
            Err(NotepadError::LoadFailure { message, .. }) => {
                assert!(message.contains("demo.other"));
            }
            other => panic!("Expected LoadFailure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_factory_registration_management() {
        let loader = PluginLoader::new();
        loader.register_factory("b.second", || {
            Box::new(TallyPlugin {
                executions: Arc::new(AtomicUsize::new(0)),
            })
        });
        loader.register_factory("a.first", || {
            Box::new(TallyPlugin {
                executions: Arc::new(AtomicUsize::new(0)),
            })
        });

        assert_eq!(loader.entry_points(), vec!["a.first", "b.second"]);
        assert!(loader.unregister_factory("a.first"));
        assert!(!loader.unregister_factory("a.first"));
        assert!(!loader.has_entry_point("a.first"));
        assert_eq!(loader.statistics().registered_entry_points, 1);
    }
}
