//! 内置示例插件
//!
//! 宿主程序自带的两个入口点，用于演示与冒烟测试。

use super::core::EditorPlugin;
use super::loader::PluginLoader;
use super::packaging::{PackageBuilder, PackageManifest};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

pub const COUNTER_ENTRY_POINT: &str = "builtin.counter";
pub const CLOCK_ENTRY_POINT: &str = "builtin.clock";

/// 计数插件：记录被执行的次数
#[derive(Debug, Default)]
pub struct CounterPlugin {
    executions: Arc<AtomicU64>,
}

impl CounterPlugin {
    pub fn new(executions: Arc<AtomicU64>) -> Self {
        Self { executions }
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }
}

impl EditorPlugin for CounterPlugin {
    fn initialize(&mut self) -> Result<()> {
        info!(executions = self.executions(), "Counter plugin ready");
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let count = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        info!(count, "Counter plugin executed");
        Ok(())
    }

    fn shutdown(&mut self) {
        info!(executions = self.executions(), "Counter plugin stopped");
    }
}

/// 时钟插件：输出当前时间
#[derive(Debug, Default)]
pub struct ClockPlugin;

impl EditorPlugin for ClockPlugin {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let now = chrono::Local::now();
        info!("Current time: {}", now.format("%Y-%m-%d %H:%M:%S"));
        Ok(())
    }
}

/// 注册内置入口点
///
/// 同一加载器创建的所有计数插件实例共享一个计数器
pub fn register_builtin_factories(loader: &PluginLoader) -> Arc<AtomicU64> {
    let executions = Arc::new(AtomicU64::new(0));
    let shared = executions.clone();
    loader.register_factory(COUNTER_ENTRY_POINT, move || {
        Box::new(CounterPlugin::new(shared.clone()))
    });
    loader.register_factory(CLOCK_ENTRY_POINT, || Box::new(ClockPlugin));
    executions
}

/// 在插件目录中生成内置插件的示例插件包
pub fn write_sample_packages(plugin_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let samples = [
        (
            "counter",
            PackageManifest::new("Counter", "Notepad", "tools", COUNTER_ENTRY_POINT)
                .with_description("Counts how often it has been executed"),
        ),
        (
            "clock",
            PackageManifest::new("Clock", "Notepad", "view", CLOCK_ENTRY_POINT)
                .with_description("Prints the current time"),
        ),
    ];

    samples
        .into_iter()
        .map(|(stem, manifest)| {
            PackageBuilder::new(manifest).write_to(&plugin_dir.join(format!("{}.{}", stem, extension)))
        })
        .collect()
}
