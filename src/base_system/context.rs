//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::config::{ConfigError, ConfigSpec, FieldMeta};
use crate::download::models::Quality;
use crate::network_parser::session::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    // 下载配置
    #[serde(default = "default_chunk_size_kb")]
    pub chunk_size_kb: usize,
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_quality")]
    pub default_quality: String,

    // 搜索配置
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            session_cookie: default_session_cookie(),
            chunk_size_kb: default_chunk_size_kb(),
            save_path: String::new(),
            default_quality: default_quality(),
            search_limit: default_search_limit(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 8] = [
            FieldMeta {
                name: "base_url",
                description: "站点根地址",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "session_cookie",
                description: "标识会话的 Cookie 名称，缺失时重新加载首页",
            },
            FieldMeta {
                name: "chunk_size_kb",
                description: "下载分块大小（KB）",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空为当前目录）",
            },
            FieldMeta {
                name: "default_quality",
                description: "自动模式默认清晰度, 可选: [480p, 720p]",
            },
            FieldMeta {
                name: "search_limit",
                description: "聚合搜索结果时的影片数量下限（按整页累计）",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let base_url = Url::parse(self.base_url.trim())
            .map_err(|e| ConfigError::Validation(format!("base_url '{}': {e}", self.base_url)))?;
        if self.session_cookie.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session_cookie must not be empty".to_string(),
            ));
        }
        Ok(SessionConfig {
            base_url,
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
            user_agent: self.user_agent.clone(),
            session_cookie: self.session_cookie.trim().to_string(),
        })
    }

    pub fn quality(&self) -> Result<Quality, ConfigError> {
        self.default_quality
            .parse()
            .map_err(|e: crate::error::FzError| ConfigError::Validation(e.to_string()))
    }
}

/// 把站点给出的文件名清理成可以安全落盘的名字。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let fallback = replacement.chars().next().unwrap_or('_');
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            ':' | '"' | '<' | '>' | '/' | '\\' | '|' | '?' | '*' => fallback,
            c if (c as u32) < 32 => fallback,
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符中间截断导致 panic
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }
    cleaned
}

fn default_base_url() -> String {
    "https://fzmovies.net".to_string()
}

fn default_request_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:129.0) Gecko/20100101 Firefox/129.0".to_string()
}

fn default_session_cookie() -> String {
    "PHPSESSID".to_string()
}

fn default_chunk_size_kb() -> usize {
    512
}

fn default_quality() -> String {
    "720p".to_string()
}

fn default_search_limit() -> usize {
    1_000_000
}
