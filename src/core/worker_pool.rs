//! 共享工作线程池
//!
//! 在独立的多线程运行时上执行插件相关的长耗时任务和I/O任务，
//! 避免阻塞界面/控制线程。线程池生命周期与进程一致：启动时创建，
//! 退出时关闭并中断尚未完成的任务。

use crate::{NotepadError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 线程池配置
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// 工作线程数
    pub worker_threads: usize,
    /// 阻塞任务线程上限（插件代码在这些线程上执行）
    pub max_blocking_threads: usize,
    /// 线程名称前缀
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get().max(2),
            max_blocking_threads: 64,
            thread_name: "plugin-worker".to_string(),
        }
    }
}

/// 线程池统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatistics {
    pub worker_threads: usize,
    pub tasks_submitted: u64,
    pub tasks_finished: u64,
    pub active_tasks: usize,
    pub running: bool,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    finished: AtomicU64,
    active: AtomicUsize,
}

/// 任务计数守卫，任务结束（包括被中断）时自动减少活跃计数
struct TaskGuard {
    counters: Arc<PoolCounters>,
}

impl TaskGuard {
    fn new(counters: Arc<PoolCounters>) -> Self {
        counters.submitted.fetch_add(1, Ordering::Relaxed);
        counters.active.fetch_add(1, Ordering::AcqRel);
        Self { counters }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::AcqRel);
        self.counters.finished.fetch_add(1, Ordering::Relaxed);
    }
}

/// 共享工作线程池
pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    counters: Arc<PoolCounters>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// 创建新的工作线程池
    pub fn new(config: WorkerPoolConfig) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(NotepadError::worker_pool("worker_threads must be positive"));
        }
        if config.max_blocking_threads == 0 {
            return Err(NotepadError::worker_pool("max_blocking_threads must be positive"));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| NotepadError::worker_pool(&format!("Failed to build runtime: {}", e)))?;
        let handle = runtime.handle().clone();

        info!(
            worker_threads = config.worker_threads,
            max_blocking_threads = config.max_blocking_threads,
            "Worker pool started"
        );

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            counters: Arc::new(PoolCounters::default()),
            config,
        })
    }

    /// 提交异步任务
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.ensure_running()?;
        let guard = TaskGuard::new(self.counters.clone());
        Ok(self.handle.spawn(async move {
            let _guard = guard;
            future.await
        }))
    }

    /// 提交阻塞任务（文件I/O、插件代码）
    pub fn spawn_blocking<F, R>(&self, task: F) -> Result<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.ensure_running()?;
        let guard = TaskGuard::new(self.counters.clone());
        Ok(self.handle.spawn_blocking(move || {
            let _guard = guard;
            task()
        }))
    }

    /// 线程池是否仍在运行
    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// 获取统计信息
    pub fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            worker_threads: self.config.worker_threads,
            tasks_submitted: self.counters.submitted.load(Ordering::Relaxed),
            tasks_finished: self.counters.finished.load(Ordering::Relaxed),
            active_tasks: self.counters.active.load(Ordering::Acquire),
            running: self.is_running(),
        }
    }

    /// 关闭线程池，未完成的任务将被中断
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            let active = self.counters.active.load(Ordering::Acquire);
            runtime.shutdown_background();
            info!(interrupted_tasks = active, "Worker pool stopped");
        } else {
            debug!("Worker pool already stopped");
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(NotepadError::worker_pool("worker pool has been shut down"))
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // 运行时不能在异步上下文中直接析构，统一走后台关闭
        self.shutdown();
    }
}

/// 将任务等待失败转换为运行时错误
pub fn join_error(error: tokio::task::JoinError) -> NotepadError {
    if error.is_cancelled() {
        NotepadError::worker_pool("task was cancelled before completion")
    } else {
        NotepadError::worker_pool(&format!("task panicked: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_pool() -> WorkerPool {
        WorkerPool::new(WorkerPoolConfig {
            worker_threads: 2,
            max_blocking_threads: 4,
            thread_name: "test-worker".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = WorkerPoolConfig {
            worker_threads: 0,
            ..WorkerPoolConfig::default()
        };
        assert!(matches!(
            WorkerPool::new(config),
            Err(NotepadError::WorkerPool { .. })
        ));
    }

    #[tokio::test]
    async fn test_spawn_and_blocking_tasks_complete() {
        let pool = small_pool();

        let value = pool.spawn(async { 21 * 2 }).unwrap().await.unwrap();
        assert_eq!(value, 42);

        let text = pool
            .spawn_blocking(|| {
                std::thread::sleep(Duration::from_millis(10));
                "done".to_string()
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(text, "done");

        let stats = pool.statistics();
        assert_eq!(stats.tasks_submitted, 2);
        assert_eq!(stats.tasks_finished, 2);
        assert_eq!(stats.active_tasks, 0);
        assert!(stats.running);
    }

    #[tokio::test]
    async fn test_blocked_task_does_not_starve_others() {
        let pool = small_pool();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let stuck = pool
            .spawn_blocking(move || {
                let _ = release_rx.recv();
            })
            .unwrap();
        let quick = pool.spawn_blocking(|| 7).unwrap();

        assert_eq!(quick.await.unwrap(), 7);
        release_tx.send(()).unwrap();
        stuck.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let pool = small_pool();
        let result = pool
            .spawn_blocking(|| -> u32 { panic!("plugin exploded") })
            .unwrap()
            .await;

        let error = join_error(result.unwrap_err());
        assert!(matches!(error, NotepadError::WorkerPool { .. }));
        assert_eq!(pool.statistics().active_tasks, 0);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_tasks() {
        let pool = small_pool();
        pool.shutdown();
        assert!(!pool.is_running());
        assert!(pool.spawn(async {}).is_err());
        assert!(pool.spawn_blocking(|| ()).is_err());
        // 重复关闭是安全的
        pool.shutdown();
    }
}
