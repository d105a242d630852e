//! Notepad 插件运行时命令行宿主
//!
//! 通过YAML配置文件驱动的插件管理工具

use anyhow::{bail, Context};
use notepad_runtime::{
    config::{generate_default_config_file, ConfigManager},
    init_logging,
    plugins::builtin::{register_builtin_factories, write_sample_packages},
    PluginKey, PluginLoader, PluginManager, RuntimeConfig,
};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 默认配置文件
const DEFAULT_CONFIG_FILE: &str = "notepad_runtime.yaml";
/// 指定配置文件的环境变量
const CONFIG_ENV: &str = "NOTEPAD_RUNTIME_CONFIG";

/// 程序入口点
#[tokio::main]
async fn main() {
    if let Err(e) = run_main().await {
        tracing::error!("Plugin runtime failed: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

/// 主要逻辑函数
async fn run_main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };

    let config_path = config_path();
    if command == "init" {
        return init(&config_path).await;
    }

    let config = load_config(&config_path).await?;
    // 日志初始化失败时继续运行
    let _ = init_logging(config.logging.level);

    let loader = Arc::new(PluginLoader::new());
    register_builtin_factories(&loader);
    let manager = PluginManager::new(config, loader).context("failed to create plugin manager")?;

    let restore = manager.start().await?;
    tracing::info!(
        "Restored {} plugins, discovered {}, missing {}",
        restore.restored.len(),
        restore.discovered.len(),
        restore.missing.len()
    );
    let init_report = manager.initialize_all().await;
    for (key, message) in &init_report.failed {
        tracing::warn!("Plugin {} failed to initialize: {}", key, message);
    }

    let outcome = run_command(&manager, command, &args[1..]).await;
    manager.shutdown().await.context("failed to shut down plugin runtime")?;
    outcome
}

async fn run_command(manager: &PluginManager, command: &str, args: &[String]) -> anyhow::Result<()> {
    match command {
        "list" => {
            list_plugins(manager);
            Ok(())
        }
        "install" => {
            let [package] = args else {
                bail!("usage: notepad_runtime install <package>");
            };
            let info = manager.install_from(package).await?;
            println!("Installed {} {} [{}]", info.key(), info.version, info.category);
            Ok(())
        }
        "enable" => {
            let key = plugin_key(args)?;
            manager.enable(&key).await?;
            println!("Enabled {}", key);
            Ok(())
        }
        "disable" => {
            let key = plugin_key(args)?;
            manager.disable(&key).await?;
            println!("Disabled {}", key);
            Ok(())
        }
        "execute" => {
            let key = plugin_key(args)?;
            manager.execute(&key).await?;
            println!("Executed {}", key);
            Ok(())
        }
        "uninstall" => {
            let key = plugin_key(args)?;
            manager.uninstall(&key).await?;
            println!("Uninstalled {}", key);
            Ok(())
        }
        "run-all" => {
            for (key, result) in manager.execute_all().await {
                match result {
                    Ok(()) => println!("  ok     {}", key),
                    Err(e) => println!("  failed {}: {}", key, e),
                }
            }
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command '{}'", other)
        }
    }
}

/// 生成默认配置文件与示例插件包
async fn init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("Config file {} already exists", config_path.display());
    } else {
        generate_default_config_file(config_path)
            .await
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("Wrote default config to {}", config_path.display());
    }

    let config = load_config(config_path).await?;
    let packages = write_sample_packages(&config.plugins.plugin_dir, &config.plugins.package_extension)?;
    for package in packages {
        println!("Wrote sample package {}", package.display());
    }
    Ok(())
}

async fn load_config(config_path: &Path) -> anyhow::Result<RuntimeConfig> {
    let manager = if config_path.exists() {
        ConfigManager::load_from_file(config_path)
            .await
            .with_context(|| format!("failed to load {}", config_path.display()))?
    } else {
        ConfigManager::new_default()
    };
    manager.validate()?;
    Ok(manager.into_config())
}

fn config_path() -> PathBuf {
    env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn plugin_key(args: &[String]) -> anyhow::Result<PluginKey> {
    match args {
        [name, author] => Ok(PluginKey::new(name.as_str(), author.as_str())),
        _ => bail!("expected <name> <author>"),
    }
}

fn list_plugins(manager: &PluginManager) {
    let infos = manager.get_plugin_infos();
    if infos.is_empty() {
        println!("No plugins installed");
        return;
    }

    for category in manager.list_by_category().into_keys() {
        println!("{}:", category);
        for info in infos.iter().filter(|info| info.category == category) {
            println!(
                "  {:<24} {:<16} {:<10} {:?}",
                info.name,
                info.author,
                info.version,
                manager.state(&info.key())
            );
        }
    }
}

/// 打印使用说明
fn print_usage() {
    println!("Notepad 插件运行时");
    println!();
    println!("用法:");
    println!("  notepad_runtime init                       # 生成默认配置文件与示例插件包");
    println!("  notepad_runtime list                       # 按分类列出插件");
    println!("  notepad_runtime install <package>          # 安装插件包");
    println!("  notepad_runtime enable <name> <author>     # 启用插件");
    println!("  notepad_runtime disable <name> <author>    # 禁用插件");
    println!("  notepad_runtime execute <name> <author>    # 执行插件");
    println!("  notepad_runtime uninstall <name> <author>  # 卸载插件");
    println!("  notepad_runtime run-all                    # 执行所有已启用插件");
    println!();
    println!("配置文件: ${} 或 ./{}", CONFIG_ENV, DEFAULT_CONFIG_FILE);
}
