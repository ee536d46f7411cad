//! 统一错误类型。
//!
//! 每一类失败对应一个变体：引导失败、零结果、会话过期、跳转前置条件、
//! 翻页目标缺失、页面结构异常、传输错误等，均向上传播给调用方。

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

pub type Result<T> = std::result::Result<T, FzError>;

#[derive(Debug, Error)]
pub enum FzError {
    #[error("failed to load index page - ({status} : {reason})")]
    LoadIndex { status: u16, reason: String },

    /// 查询成功执行但没有匹配项（非致命的控制流信号）。
    #[error("search returned no results - {0}")]
    ZeroSearchResults(String),

    #[error("download keys have expired, recover via {redirect_to}")]
    SessionExpired { redirect_to: Url },

    #[error("invalid {hop} url '{url}'")]
    NavigationPrecondition { hop: &'static str, url: String },

    #[error("the targeted page, {0}, has no url")]
    TargetPageUrlNotFound(&'static str),

    #[error("unexpected {page} markup: {detail}")]
    Malformed { page: &'static str, detail: String },

    #[error("{name} '{value}' is not one of {allowed:?}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("query results first before navigating")]
    NotQueried,

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("cannot download file without a content-length")]
    MissingContentLength,

    #[error("file not found in path - '{}'", .0.display())]
    ResumeTargetMissing(PathBuf),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl FzError {
    pub(crate) fn malformed(page: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            page,
            detail: detail.into(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    pub fn redirect_target(&self) -> Option<&Url> {
        match self {
            Self::SessionExpired { redirect_to } => Some(redirect_to),
            _ => None,
        }
    }
}
