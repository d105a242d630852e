//! 核心数据类型

use serde::{Deserialize, Serialize};
use std::fmt;

/// 纳秒时间戳
pub type TimestampNs = i64;

/// 当前时间（纳秒）
pub fn now_ns() -> TimestampNs {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// 插件身份标识
///
/// 以 (名称, 作者) 区分已安装的插件，插件名称本身不保证唯一
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginKey {
    pub name: String,
    pub author: String,
}

impl PluginKey {
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
        }
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_key_identity() {
        let a = PluginKey::new("Counter", "A");
        let b = PluginKey::new("Counter", "B");
        assert_ne!(a, b);
        assert_eq!(a, PluginKey::new("Counter".to_string(), "A"));
        assert_eq!(a.to_string(), "Counter (A)");
    }

    #[test]
    fn test_now_ns_is_positive() {
        assert!(now_ns() > 0);
    }
}
