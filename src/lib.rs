//! fzmovies.net 搜索、解析与可续传下载。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志等基础设施
//! - `network_parser`：共享会话、查询构造
//! - `page_parser`：页面到数据模型的解析
//! - `download`：搜索聚合、解析链、下载与自动模式

pub mod base_system;
pub mod download;
pub mod error;
pub mod network_parser;
pub mod page_parser;

pub use download::models::{
    DownloadBundle, DownloadCandidate, FileEntry, MovieDetail, MovieSummary, Quality,
    RecommendedMovie, SaveOutcome, SearchResultPage,
};
pub use download::{
    Aggregated, Auto, Download, NavigationChain, SaveOptions, SearchEngine, search,
    search_by_filter,
};
pub use error::{FzError, Result};
pub use network_parser::{Filter, FilterKind, PageTarget, Session, SessionConfig};
