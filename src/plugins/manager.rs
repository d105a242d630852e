//! 插件生命周期管理器
//!
//! 宿主应用唯一调用的组件：协调插件的安装、启用、禁用、执行和卸载，
//! 按插件身份串行化状态修改，并将插件代码与文件I/O派发到共享工作线程池。
//!
//! 状态机：
//!
//! ```text
//! install ──> Disabled ──enable──> Enabled ──execute──> Executing ──> Enabled
//!                ^                    │
//!                └──────disable───────┘
//! 任意状态 ──uninstall──> Uninstalled
//! ```

use super::core::{EditorPlugin, PluginEvent, PluginEventKind, PluginHandle, PluginInfo, PluginState};
use super::inspector;
use super::loader::{LoaderStatistics, PluginLoader};
use super::persistence::{PluginSeed, PluginStateStore};
use super::registry::PluginRegistry;
use crate::config::RuntimeConfig;
use crate::core::worker_pool::{join_error, PoolStatistics, WorkerPool};
use crate::types::PluginKey;
use crate::{NotepadError, Result};
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 事件通道容量
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 启动恢复报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// 按持久化记录恢复的插件
    pub restored: Vec<PluginKey>,
    /// 插件目录中新发现的插件（以禁用状态加入）
    pub discovered: Vec<PluginKey>,
    /// 有持久化记录但插件包已不存在的插件
    pub missing: Vec<PluginKey>,
}

/// 启动初始化报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializationReport {
    pub initialized: Vec<PluginKey>,
    pub failed: Vec<(PluginKey, String)>,
}

/// 运行时统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStatistics {
    pub installed: usize,
    pub enabled: usize,
    pub executing: usize,
    pub categories: usize,
    pub loader: LoaderStatistics,
    pub pool: PoolStatistics,
}

/// 状态文件写入器
///
/// 写入锁内读取注册表快照，保证最后一次写入反映最新状态
struct StateWriter {
    registry: Arc<RwLock<PluginRegistry>>,
    store: PluginStateStore,
    lock: Mutex<()>,
    dirty: AtomicBool,
}

impl StateWriter {
    fn write(&self) -> Result<()> {
        let _guard = self.lock.lock();
        // 先清除标志再取快照，取快照之后的修改会重新标记
        self.dirty.store(false, Ordering::Release);
        let seeds: Vec<PluginSeed> = self
            .registry
            .read()
            .all()
            .iter()
            .map(PluginSeed::from)
            .collect();

        match self.store.write_seeds(&seeds) {
            Ok(()) => Ok(()),
            Err(e) => {
                // 下一次修改操作会重新写入
                self.dirty.store(true, Ordering::Release);
                warn!("Failed to persist plugin state: {}", e);
                Err(e)
            }
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

/// 执行中标记，插件代码返回（或线程池中断任务）时移除
struct ExecutingGuard {
    executing: Arc<DashSet<PluginKey>>,
    key: PluginKey,
}

impl ExecutingGuard {
    fn new(executing: Arc<DashSet<PluginKey>>, key: PluginKey) -> Self {
        executing.insert(key.clone());
        Self { executing, key }
    }
}

impl Drop for ExecutingGuard {
    fn drop(&mut self) {
        self.executing.remove(&self.key);
    }
}

/// 插件生命周期管理器
pub struct PluginManager {
    config: RuntimeConfig,
    loader: Arc<PluginLoader>,
    registry: Arc<RwLock<PluginRegistry>>,
    writer: Arc<StateWriter>,
    pool: Arc<WorkerPool>,
    /// 按身份的互斥锁
    identity_locks: DashMap<PluginKey, Arc<AsyncMutex<()>>>,
    executing: Arc<DashSet<PluginKey>>,
    pending_writes: Mutex<Vec<JoinHandle<Result<()>>>>,
    events: broadcast::Sender<PluginEvent>,
}

impl PluginManager {
    /// 创建管理器及其专用工作线程池
    pub fn new(config: RuntimeConfig, loader: Arc<PluginLoader>) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(WorkerPool::new(config.worker_pool_config())?);
        Ok(Self::with_pool(config, loader, pool))
    }

    /// 使用已有的工作线程池创建管理器
    pub fn with_pool(config: RuntimeConfig, loader: Arc<PluginLoader>, pool: Arc<WorkerPool>) -> Self {
        let registry = Arc::new(RwLock::new(PluginRegistry::new()));
        let writer = Arc::new(StateWriter {
            registry: registry.clone(),
            store: PluginStateStore::new(config.plugins.state_file.clone()),
            lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        });
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            loader,
            registry,
            writer,
            pool,
            identity_locks: DashMap::new(),
            executing: Arc::new(DashSet::new()),
            pending_writes: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    /// 订阅插件生命周期事件
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    /// 启动恢复
    ///
    /// 读取持久化记录并扫描插件目录：按记录顺序恢复插件及其启用标志，
    /// 目录中新出现的插件包以禁用状态追加，插件包已消失的记录被丢弃。
    /// 之后由调用方执行 `initialize_all`。
    pub async fn start(&self) -> Result<RestoreReport> {
        let store = self.writer.store.clone();
        let plugin_dir = self.config.plugins.plugin_dir.clone();
        let extension = self.config.plugins.package_extension.clone();
        let (seeds, scanned) = self
            .pool
            .spawn_blocking(move || (store.read(), inspector::scan_directory(&plugin_dir, &extension)))?
            .await
            .map_err(join_error)?;

        let mut report = RestoreReport::default();
        let mut packages: Vec<Option<PluginInfo>> = scanned.into_iter().map(Some).collect();
        let mut candidates: Vec<(PluginInfo, bool)> = Vec::new();

        for seed in &seeds {
            let key = seed.key();
            let matched = packages
                .iter_mut()
                .find(|slot| matches!(slot, Some(info) if info.matches(&key)))
                .and_then(Option::take);
            match matched {
                Some(mut info) => {
                    info.enabled = seed.enabled;
                    candidates.push((info, true));
                }
                None => {
                    warn!(plugin = %key, "Persisted plugin has no package in the plugin directory");
                    report.missing.push(key);
                }
            }
        }
        candidates.extend(packages.into_iter().flatten().map(|info| (info, false)));

        {
            let mut registry = self.registry.write();
            for (info, persisted) in candidates {
                let key = info.key();
                match registry.add(info) {
                    Ok(()) if persisted => report.restored.push(key),
                    Ok(()) => report.discovered.push(key),
                    Err(e) => warn!(plugin = %key, "Skipping plugin package: {}", e),
                }
            }
        }

        info!(
            restored = report.restored.len(),
            discovered = report.discovered.len(),
            missing = report.missing.len(),
            "Plugin state restored"
        );
        if !report.discovered.is_empty() || !report.missing.is_empty() {
            self.schedule_persist();
        }
        Ok(report)
    }

    /// 加载并初始化所有已启用但尚未加载的插件
    ///
    /// 按注册顺序在调用方任务上依次执行；单个插件失败会被记录并恢复为禁用，
    /// 不影响其他插件。
    pub async fn initialize_all(&self) -> InitializationReport {
        let pending: Vec<(PluginKey, PathBuf, String)> = self
            .registry
            .read()
            .all()
            .iter()
            .filter(|info| info.enabled && !info.is_loaded())
            .map(|info| (info.key(), info.package_path.clone(), info.entry_point.clone()))
            .collect();

        let mut report = InitializationReport::default();
        for (key, package_path, entry_point) in pending {
            let lock = self.identity_lock(&key);
            let _guard = lock.lock().await;

            match activate(&self.loader, &package_path, &entry_point, &key.to_string()) {
                Ok(handle) => {
                    let attached = self.registry.write().set_instance(&key, Some(handle.clone()));
                    if let Err(e) = attached {
                        warn!(plugin = %key, "Plugin vanished during initialization: {}", e);
                        shutdown_instance(&handle, &key.to_string());
                        continue;
                    }
                    info!(plugin = %key, "Plugin initialized");
                    self.publish(&key, PluginEventKind::Enabled);
                    report.initialized.push(key);
                }
                Err(e) => {
                    error!(plugin = %key, "Failed to initialize plugin: {}", e);
                    if let Err(mark_error) = self.registry.write().mark_enabled(&key, false) {
                        debug!(plugin = %key, "{}", mark_error);
                    }
                    self.writer.mark_dirty();
                    self.publish(&key, PluginEventKind::Failed { message: e.to_string() });
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        info!(
            initialized = report.initialized.len(),
            failed = report.failed.len(),
            "Plugin initialization finished"
        );
        report
    }

    /// 安装插件包（已位于插件目录中）
    ///
    /// 插件以禁用状态加入注册表；本操作不写状态文件
    pub async fn install(&self, package_path: impl AsRef<Path>) -> Result<PluginInfo> {
        let path = package_path.as_ref().to_path_buf();
        let info = self
            .pool
            .spawn_blocking(move || inspector::inspect(&path))?
            .await
            .map_err(join_error)??;

        let key = info.key();
        let lock = self.identity_lock(&key);
        let _guard = lock.lock().await;

        self.registry.write().add(info.clone())?;
        self.writer.mark_dirty();

        info!(plugin = %key, category = %info.category, version = %info.version, "Plugin installed");
        self.publish(&key, PluginEventKind::Installed);
        Ok(info)
    }

    /// 将外部插件包复制到插件目录后安装
    pub async fn install_from(&self, source: impl AsRef<Path>) -> Result<PluginInfo> {
        let source = source.as_ref().to_path_buf();
        let plugin_dir = self.config.plugins.plugin_dir.clone();
        if source.parent() == Some(plugin_dir.as_path()) {
            return self.install(&source).await;
        }

        let inspect_path = source.clone();
        let declared = self
            .pool
            .spawn_blocking(move || inspector::inspect(&inspect_path))?
            .await
            .map_err(join_error)??;
        if self.registry.read().contains(&declared.key()) {
            return Err(NotepadError::DuplicateInstall {
                name: declared.name,
                author: declared.author,
            });
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| NotepadError::invalid_package(&source, "package path has no file name"))?;
        let destination = plugin_dir.join(file_name);

        let copy_to = destination.clone();
        self.pool
            .spawn_blocking(move || -> Result<()> {
                fs::create_dir_all(&plugin_dir)?;
                if copy_to.exists() {
                    return Err(NotepadError::invalid_state(&format!(
                        "{} already exists in the plugin directory",
                        copy_to.display()
                    )));
                }
                fs::copy(&source, &copy_to)?;
                Ok(())
            })?
            .await
            .map_err(join_error)??;

        match self.install(&destination).await {
            Ok(info) => Ok(info),
            Err(e) => {
                if let Err(remove_error) = tokio::fs::remove_file(&destination).await {
                    warn!(package = %destination.display(), "Failed to remove copied package: {}", remove_error);
                }
                Err(e)
            }
        }
    }

    /// 启用插件：加载入口点并初始化
    ///
    /// 已启用的插件直接返回；失败时插件保持禁用，错误返回给调用方
    pub async fn enable(&self, key: &PluginKey) -> Result<()> {
        let lock = self.identity_lock(key);
        let _guard = lock.lock().await;

        let (package_path, entry_point, was_enabled) = {
            let registry = self.registry.read();
            let info = registry
                .find(key)
                .ok_or_else(|| NotepadError::plugin_not_found(&key.to_string()))?;
            if info.is_loaded() {
                debug!(plugin = %key, "Plugin already enabled");
                return Ok(());
            }
            (info.package_path.clone(), info.entry_point.clone(), info.enabled)
        };

        let loader = self.loader.clone();
        let label = key.to_string();
        let activated = self
            .pool
            .spawn_blocking(move || activate(&loader, &package_path, &entry_point, &label))?
            .await
            .map_err(join_error)?;

        match activated {
            Ok(handle) => {
                self.registry.write().set_instance(key, Some(handle))?;
                info!(plugin = %key, "Plugin enabled");
                self.publish(key, PluginEventKind::Enabled);
                self.schedule_persist();
                Ok(())
            }
            Err(e) => {
                warn!(plugin = %key, "Failed to enable plugin: {}", e);
                self.registry.write().mark_enabled(key, false)?;
                if was_enabled {
                    // 恢复时启用但未能加载的插件，启用标志需要写回
                    self.writer.mark_dirty();
                }
                self.publish(key, PluginEventKind::Failed { message: e.to_string() });
                Err(e)
            }
        }
    }

    /// 禁用插件：释放实例，保留插件包，异步写入状态文件
    pub async fn disable(&self, key: &PluginKey) -> Result<()> {
        let lock = self.identity_lock(key);
        let _guard = lock.lock().await;

        let previous = {
            let mut registry = self.registry.write();
            let info = registry
                .find(key)
                .ok_or_else(|| NotepadError::plugin_not_found(&key.to_string()))?;
            if !info.enabled && !info.is_loaded() {
                debug!(plugin = %key, "Plugin already disabled");
                return Ok(());
            }
            registry.set_instance(key, None)?
        };

        if let Some(handle) = previous {
            let label = key.to_string();
            self.pool
                .spawn_blocking(move || shutdown_instance(&handle, &label))?
                .await
                .map_err(join_error)?;
        }

        info!(plugin = %key, "Plugin disabled");
        self.publish(key, PluginEventKind::Disabled);
        self.schedule_persist();
        Ok(())
    }

    /// 执行插件
    ///
    /// 插件代码在线程池的阻塞线程上运行；插件返回的错误与 panic
    /// 均以 `PluginRuntime` 错误返回
    pub async fn execute(&self, key: &PluginKey) -> Result<()> {
        let lock = self.identity_lock(key);
        let _guard = lock.lock().await;

        let handle = {
            let registry = self.registry.read();
            let info = registry
                .find(key)
                .ok_or_else(|| NotepadError::plugin_not_found(&key.to_string()))?;
            info.instance.clone().ok_or_else(|| {
                NotepadError::invalid_state(&format!("plugin {} is not enabled", key))
            })?
        };

        let marker = ExecutingGuard::new(self.executing.clone(), key.clone());
        let label = key.to_string();
        let outcome = self
            .pool
            .spawn_blocking(move || {
                let _marker = marker;
                run_guarded(&handle, &label, |plugin| plugin.execute())
            })?
            .await
            .map_err(join_error)?;

        match outcome {
            Ok(()) => {
                debug!(plugin = %key, "Plugin executed");
                self.publish(key, PluginEventKind::Executed);
                Ok(())
            }
            Err(e) => {
                warn!(plugin = %key, "Plugin execution failed: {}", e);
                self.publish(key, PluginEventKind::Failed { message: e.to_string() });
                Err(e)
            }
        }
    }

    /// 并发执行所有已加载的插件，返回每个插件的结果
    pub async fn execute_all(&self) -> Vec<(PluginKey, Result<()>)> {
        let keys: Vec<PluginKey> = self
            .registry
            .read()
            .all()
            .iter()
            .filter(|info| info.is_loaded())
            .map(PluginInfo::key)
            .collect();

        let results = join_all(keys.iter().map(|key| self.execute(key))).await;
        keys.into_iter().zip(results).collect()
    }

    /// 卸载插件
    ///
    /// 立即从注册表移除；实例关闭、插件包删除和状态文件写入在线程池上完成。
    /// 删除插件包失败只记录日志。
    pub async fn uninstall(&self, key: &PluginKey) -> Result<()> {
        let lock = self.identity_lock(key);
        let _guard = lock.lock().await;

        if !self.pool.is_running() {
            return Err(NotepadError::worker_pool("worker pool has been shut down"));
        }
        let removed = self
            .registry
            .write()
            .remove(key)
            .ok_or_else(|| NotepadError::plugin_not_found(&key.to_string()))?;
        self.writer.mark_dirty();
        info!(plugin = %key, "Plugin removed from registry");

        let plugin_dir = self.config.plugins.plugin_dir.clone();
        let extension = self.config.plugins.package_extension.clone();
        let writer = self.writer.clone();
        let task_key = key.clone();
        self.pool
            .spawn_blocking(move || {
                if let Some(handle) = &removed.instance {
                    shutdown_instance(handle, &task_key.to_string());
                }
                delete_backing_packages(&removed.package_path, &plugin_dir, &extension, &task_key);
                // 写入失败已记录并标记为待写
                let _ = writer.write();
            })?
            .await
            .map_err(join_error)?;

        // 仍有其他操作持有该锁时保留，避免同一身份出现两把锁
        self.identity_locks
            .remove_if(key, |_, entry| Arc::strong_count(entry) <= 2);
        self.publish(key, PluginEventKind::Uninstalled);
        Ok(())
    }

    /// 按分类列出插件名称
    pub fn list_by_category(&self) -> BTreeMap<String, Vec<String>> {
        self.registry.read().by_category().clone()
    }

    /// 所有插件信息（按注册顺序）
    ///
    /// 返回的快照不携带插件实例，插件只能经由管理器执行
    pub fn get_plugin_infos(&self) -> Vec<PluginInfo> {
        self.registry.read().all().iter().map(PluginInfo::snapshot).collect()
    }

    pub fn find(&self, key: &PluginKey) -> Option<PluginInfo> {
        self.registry.read().find(key).map(PluginInfo::snapshot)
    }

    /// 插件实例是否已加载
    pub fn is_loaded(&self, key: &PluginKey) -> bool {
        self.registry.read().find(key).map_or(false, PluginInfo::is_loaded)
    }

    /// 插件当前状态，未安装的插件视为已卸载
    pub fn state(&self, key: &PluginKey) -> PluginState {
        let registry = self.registry.read();
        match registry.find(key) {
            Some(_) if self.executing.contains(key) => PluginState::Executing,
            Some(info) => info.state(),
            None => PluginState::Uninstalled,
        }
    }

    /// 立即写入状态文件
    pub async fn persist_now(&self) -> Result<()> {
        let writer = self.writer.clone();
        self.pool
            .spawn_blocking(move || writer.write())?
            .await
            .map_err(join_error)?
    }

    /// 等待后台写入完成，仍有未写入的修改时补写
    pub async fn flush(&self) -> Result<()> {
        self.await_pending_writes().await;
        if self.writer.is_dirty() {
            self.persist_now().await?;
        }
        Ok(())
    }

    /// 关闭运行时：释放所有插件实例，写入状态文件，停止工作线程池
    pub async fn shutdown(&self) -> Result<()> {
        if !self.pool.is_running() {
            debug!("Plugin runtime already shut down");
            return Ok(());
        }

        let handles: Vec<(PluginKey, PluginHandle)> = self
            .registry
            .read()
            .all()
            .iter()
            .filter_map(|info| info.instance.clone().map(|handle| (info.key(), handle)))
            .collect();
        if !handles.is_empty() {
            let released = self.pool.spawn_blocking(move || {
                handles
                    .iter()
                    .filter(|(key, handle)| !shutdown_idle_instance(handle, &key.to_string()))
                    .count()
            });
            match released {
                Ok(task) => match task.await {
                    Ok(0) => {}
                    Ok(skipped) => warn!(skipped, "Some plugins were still executing at shutdown"),
                    Err(e) => warn!("Plugin instance shutdown did not finish: {}", join_error(e)),
                },
                Err(e) => warn!("Failed to schedule plugin instance shutdown: {}", e),
            }
        }

        self.await_pending_writes().await;
        let persisted = self.persist_now().await;
        self.pool.shutdown();
        info!("Plugin runtime shut down");
        persisted
    }

    /// 获取运行时统计信息
    pub fn statistics(&self) -> RuntimeStatistics {
        let registry = self.registry.read();
        RuntimeStatistics {
            installed: registry.len(),
            enabled: registry.enabled().count(),
            executing: self.executing.len(),
            categories: registry.by_category().len(),
            loader: self.loader.statistics(),
            pool: self.pool.statistics(),
        }
    }

    fn identity_lock(&self, key: &PluginKey) -> Arc<AsyncMutex<()>> {
        self.identity_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .value()
            .clone()
    }

    fn publish(&self, key: &PluginKey, kind: PluginEventKind) {
        // 没有订阅者时事件被丢弃
        let _ = self.events.send(PluginEvent::new(key.clone(), kind));
    }

    /// 在线程池上异步写入状态文件
    fn schedule_persist(&self) {
        self.writer.mark_dirty();
        let writer = self.writer.clone();
        match self.pool.spawn_blocking(move || writer.write()) {
            Ok(handle) => {
                let mut pending = self.pending_writes.lock();
                pending.retain(|write| !write.is_finished());
                pending.push(handle);
            }
            Err(e) => warn!("Failed to schedule plugin state write: {}", e),
        }
    }

    async fn await_pending_writes(&self) {
        let pending = std::mem::take(&mut *self.pending_writes.lock());
        for write in pending {
            match write.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Background state write failed: {}", e),
                Err(e) => warn!("Background state write did not finish: {}", e),
            }
        }
    }
}

/// 加载入口点并调用 `initialize`
fn activate(loader: &PluginLoader, package_path: &Path, entry_point: &str, label: &str) -> Result<PluginHandle> {
    let handle = loader.load(package_path, entry_point)?;
    run_guarded(&handle, label, |plugin| plugin.initialize())?;
    Ok(handle)
}

/// 调用插件代码，将其错误和 panic 转换为 `PluginRuntime`
fn run_guarded<F>(handle: &PluginHandle, label: &str, operation: F) -> Result<()>
where
    F: FnOnce(&mut Box<dyn EditorPlugin>) -> Result<()>,
{
    let mut plugin = handle.lock();
    call_guarded(&mut *plugin, label, operation)
}

fn call_guarded<F>(plugin: &mut Box<dyn EditorPlugin>, label: &str, operation: F) -> Result<()>
where
    F: FnOnce(&mut Box<dyn EditorPlugin>) -> Result<()>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| operation(plugin)));

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.is_plugin_runtime() => Err(e),
        Ok(Err(e)) => Err(NotepadError::plugin_runtime(label, &e.to_string())),
        Err(payload) => Err(NotepadError::plugin_runtime(
            label,
            &format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn shutdown_instance(handle: &PluginHandle, label: &str) {
    let outcome = run_guarded(handle, label, |plugin| {
        plugin.shutdown();
        Ok(())
    });
    if let Err(e) = outcome {
        warn!(plugin = label, "Plugin shutdown failed: {}", e);
    }
}

/// 关闭未在执行中的插件实例，仍在执行的实例被跳过
fn shutdown_idle_instance(handle: &PluginHandle, label: &str) -> bool {
    let Some(mut plugin) = handle.try_lock() else {
        warn!(plugin = label, "Plugin still executing, shutdown skipped");
        return false;
    };
    let outcome = call_guarded(&mut *plugin, label, |plugin| {
        plugin.shutdown();
        Ok(())
    });
    if let Err(e) = outcome {
        warn!(plugin = label, "Plugin shutdown failed: {}", e);
    }
    true
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 删除插件包
///
/// 优先使用安装时记录的路径；该路径已不再指向此插件时，扫描插件目录按身份匹配。
/// 文件不存在视为成功。返回实际删除的文件数。
fn delete_backing_packages(stored_path: &Path, plugin_dir: &Path, extension: &str, key: &PluginKey) -> usize {
    let stored_matches = inspector::inspect(stored_path)
        .map(|info| info.matches(key))
        .unwrap_or(false);
    let targets = if stored_matches {
        vec![stored_path.to_path_buf()]
    } else {
        debug!(plugin = %key, package = %stored_path.display(), "Stored package path is stale, scanning plugin directory");
        inspector::find_packages(plugin_dir, extension, key)
    };

    if targets.is_empty() {
        warn!(plugin = %key, "No package found to delete");
        return 0;
    }

    let mut deleted = 0;
    for path in targets {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(plugin = %key, package = %path.display(), "Plugin package deleted");
                deleted += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(plugin = %key, package = %path.display(), "Plugin package already gone");
            }
            Err(e) => {
                warn!(plugin = %key, package = %path.display(), "Failed to delete plugin package: {}", e);
            }
        }
    }
    deleted
}
