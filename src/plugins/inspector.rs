//! 插件包检查器
//!
//! 从插件包中读取声明的元数据，不实例化包内任何代码。
//! 安装时以及在插件目录中按身份查找插件包时使用。

use super::core::PluginInfo;
use super::packaging::DESCRIPTOR_FILE;
use crate::types::PluginKey;
use crate::{NotepadError, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

/// 描述文件原始内容，字段是否缺失在检查阶段判断
#[derive(Debug, Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    author: Option<String>,
    version: Option<String>,
    category: Option<String>,
    entry_point: Option<String>,
    description: Option<String>,
}

/// 检查插件包并返回插件信息（未启用、未加载）
pub fn inspect(package_path: &Path) -> Result<PluginInfo> {
    let file = File::open(package_path).map_err(|e| {
        NotepadError::invalid_package(package_path, &format!("cannot open package: {}", e))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| {
        NotepadError::invalid_package(package_path, &format!("not a readable archive: {}", e))
    })?;

    let mut content = String::new();
    {
        let mut descriptor = archive.by_name(DESCRIPTOR_FILE).map_err(|e| match e {
            ZipError::FileNotFound => NotepadError::invalid_package(
                package_path,
                &format!("missing descriptor {}", DESCRIPTOR_FILE),
            ),
            other => NotepadError::invalid_package(
                package_path,
                &format!("cannot read descriptor: {}", other),
            ),
        })?;
        descriptor.read_to_string(&mut content).map_err(|e| {
            NotepadError::invalid_package(package_path, &format!("cannot read descriptor: {}", e))
        })?;
    }

    let raw: RawDescriptor = toml::from_str(&content).map_err(|e| {
        NotepadError::invalid_package(package_path, &format!("malformed descriptor: {}", e))
    })?;

    Ok(PluginInfo {
        name: required(package_path, "name", raw.name)?,
        author: required(package_path, "author", raw.author)?,
        version: required(package_path, "version", raw.version)?,
        category: required(package_path, "category", raw.category)?,
        entry_point: required(package_path, "entry_point", raw.entry_point)?,
        description: raw.description.filter(|d| !d.trim().is_empty()),
        enabled: false,
        package_path: package_path.to_path_buf(),
        instance: None,
    })
}

fn required(package_path: &Path, field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(NotepadError::invalid_package(
            package_path,
            &format!("missing required field '{}'", field),
        )),
    }
}

/// 列出目录下所有扩展名匹配的插件包文件（按文件名排序）
pub fn package_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Plugin directory does not exist");
        return Vec::new();
    }

    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(dir = %dir.display(), "Failed to read plugin directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extension))
        .collect()
}

/// 扫描插件目录，无效的插件包会被记录并跳过
pub fn scan_directory(dir: &Path, extension: &str) -> Vec<PluginInfo> {
    package_files(dir, extension)
        .into_iter()
        .filter_map(|path| match inspect(&path) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(package = %path.display(), "Skipping invalid plugin package: {}", e);
                None
            }
        })
        .collect()
}

/// 在插件目录中查找声明了指定身份的所有插件包
pub fn find_packages(dir: &Path, extension: &str, key: &PluginKey) -> Vec<PathBuf> {
    package_files(dir, extension)
        .into_iter()
        .filter(|path| match inspect(path) {
            Ok(info) => info.matches(key),
            Err(e) => {
                debug!(package = %path.display(), "Ignoring unreadable package: {}", e);
                false
            }
        })
        .collect()
}

/// 在插件目录中查找第一个声明了指定身份的插件包
pub fn find_package(dir: &Path, extension: &str, key: &PluginKey) -> Option<PathBuf> {
    find_packages(dir, extension, key).into_iter().next()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::packaging::{PackageBuilder, PackageManifest};
    use std::fs;
    use tempfile::TempDir;

    fn counter_manifest() -> PackageManifest {
        PackageManifest::new("Counter", "A", "tools", "demo.counter")
            .with_description("Counts executions")
    }

    #[test]
    fn test_inspect_valid_package() {
        let temp_dir = TempDir::new().unwrap();
        let path = PackageBuilder::new(counter_manifest())
            .write_to(&temp_dir.path().join("counter.npk"))
            .unwrap();

        let info = inspect(&path).unwrap();
        assert_eq!(info.name, "Counter");
        assert_eq!(info.author, "A");
        assert_eq!(info.version, "1.0.0");
        assert_eq!(info.category, "tools");
        assert_eq!(info.entry_point, "demo.counter");
        assert_eq!(info.description.as_deref(), Some("Counts executions"));
        assert_eq!(info.package_path, path);
        assert!(!info.enabled);
        assert!(info.instance.is_none());
    }

    #[test]
    fn test_inspect_missing_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let path = PackageBuilder::without_manifest()
            .with_file("readme.txt", b"no descriptor here")
            .write_to(&temp_dir.path().join("broken.npk"))
            .unwrap();

        let error = inspect(&path).unwrap_err();
        match error {
            NotepadError::InvalidPackage { message, .. } => {
                assert!(message.contains("missing descriptor"));
            }
            other => panic!("Expected InvalidPackage, got {:?}", other),
        }
    }

    #[test]
    fn test_inspect_rejects_non_archive_and_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("garbage.npk");
        fs::write(&path, b"definitely not a zip").unwrap();

        assert!(matches!(inspect(&path), Err(NotepadError::InvalidPackage { .. })));
        assert!(matches!(
            inspect(&temp_dir.path().join("absent.npk")),
            Err(NotepadError::InvalidPackage { .. })
        ));
    }

    #[test]
    fn test_inspect_missing_required_field() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.npk");
        let mut manifest = counter_manifest();
        manifest.category = "   ".to_string();
        PackageBuilder::new(manifest).write_to(&path).unwrap();

        match inspect(&path).unwrap_err() {
            NotepadError::InvalidPackage { message, .. } => {
                assert!(message.contains("'category'"));
            }
            other => panic!("Expected InvalidPackage, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_filters_extension_and_skips_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        PackageBuilder::new(counter_manifest())
            .write_to(&dir.join("b-counter.npk"))
            .unwrap();
        PackageBuilder::new(PackageManifest::new("Clock", "B", "view", "demo.clock"))
            .write_to(&dir.join("a-clock.NPK"))
            .unwrap();
        PackageBuilder::new(PackageManifest::new("Ignored", "C", "misc", "demo.ignored"))
            .write_to(&dir.join("ignored.zip"))
            .unwrap();
        fs::write(dir.join("corrupt.npk"), b"junk").unwrap();

        let found = scan_directory(dir, "npk");
        let names: Vec<&str> = found.iter().map(|info| info.name.as_str()).collect();
        assert_eq!(names, vec!["Clock", "Counter"]);
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_directory(&temp_dir.path().join("nope"), "npk").is_empty());
    }

    #[test]
    fn test_find_package_by_identity() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let path = PackageBuilder::new(counter_manifest())
            .write_to(&dir.join("renamed.npk"))
            .unwrap();
        PackageBuilder::new(PackageManifest::new("Counter", "B", "tools", "demo.counter"))
            .write_to(&dir.join("other-author.npk"))
            .unwrap();

        assert_eq!(find_package(dir, "npk", &PluginKey::new("Counter", "A")), Some(path));
        assert!(find_package(dir, "npk", &PluginKey::new("Counter", "Z")).is_none());
    }
}
