//! 插件包格式
//!
//! 插件包是一个 zip 归档，根目录下的 `plugin.toml` 描述插件元数据：
//!
//! ```toml
//! name = "Counter"
//! author = "A"
//! version = "1.0.0"
//! category = "tools"
//! entry_point = "demo.counter"
//! ```
//!
//! 其余文件为入口点的实现载荷，运行时不解析。

use crate::{NotepadError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 插件描述文件名
pub const DESCRIPTOR_FILE: &str = "plugin.toml";

/// 默认插件包扩展名
pub const DEFAULT_PACKAGE_EXTENSION: &str = "npk";

/// 插件描述（`plugin.toml` 的内容）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub author: String,
    pub version: String,
    pub category: String,
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackageManifest {
    pub fn new(name: &str, author: &str, category: &str, entry_point: &str) -> Self {
        Self {
            name: name.to_string(),
            author: author.to_string(),
            version: "1.0.0".to_string(),
            category: category.to_string(),
            entry_point: entry_point.to_string(),
            description: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// 序列化为 `plugin.toml` 文本
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| NotepadError::config(&format!("Failed to serialize manifest: {}", e)))
    }
}

/// 插件包构建器
///
/// 供外部安装流程与开发工具生成插件包
pub struct PackageBuilder {
    manifest: Option<PackageManifest>,
    files: Vec<(String, Vec<u8>)>,
}

impl PackageBuilder {
    pub fn new(manifest: PackageManifest) -> Self {
        Self {
            manifest: Some(manifest),
            files: Vec::new(),
        }
    }

    /// 不带描述文件的构建器（生成的包无法通过检查）
    pub fn without_manifest() -> Self {
        Self {
            manifest: None,
            files: Vec::new(),
        }
    }

    /// 添加载荷文件
    pub fn with_file(mut self, name: &str, contents: &[u8]) -> Self {
        self.files.push((name.to_string(), contents.to_vec()));
        self
    }

    /// 写出插件包
    pub fn write_to(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let mut archive = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Some(manifest) = &self.manifest {
            archive.start_file(DESCRIPTOR_FILE, options).map_err(zip_io_error)?;
            archive.write_all(manifest.to_toml()?.as_bytes())?;
        }
        for (name, contents) in &self.files {
            archive.start_file(name.as_str(), options).map_err(zip_io_error)?;
            archive.write_all(contents)?;
        }
        archive.finish().map_err(zip_io_error)?;

        Ok(path.to_path_buf())
    }
}

fn zip_io_error(error: zip::result::ZipError) -> NotepadError {
    NotepadError::Io(std::io::Error::new(std::io::ErrorKind::Other, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_manifest_toml_layout() {
        let manifest = PackageManifest::new("Counter", "A", "tools", "demo.counter")
            .with_version("2.1.0");
        let text = manifest.to_toml().unwrap();

        assert!(text.contains("name = \"Counter\""));
        assert!(text.contains("entry_point = \"demo.counter\""));
        assert!(!text.contains("description"));

        let parsed: PackageManifest = toml::from_str(&text).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_builder_writes_descriptor_and_payload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("counter.npk");

        PackageBuilder::new(PackageManifest::new("Counter", "A", "tools", "demo.counter"))
            .with_file("lib/counter.bin", b"\x00\x01")
            .write_to(&path)
            .unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut descriptor = String::new();
        archive
            .by_name(DESCRIPTOR_FILE)
            .unwrap()
            .read_to_string(&mut descriptor)
            .unwrap();
        assert!(descriptor.contains("Counter"));
        assert!(archive.by_name("lib/counter.bin").is_ok());
    }
}
