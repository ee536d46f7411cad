//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`     — 数据模型（MovieSummary / MovieDetail / DownloadBundle 等）
//! - `search`     — 单页查询与多页聚合
//! - `navigate`   — 五跳解析链
//! - `downloader` — 可续传的分块下载
//! - `progress`   — 进度上报与 CLI 进度条
//! - `auto`       — 一键搜索并下载

pub mod auto;
pub mod downloader;
pub mod models;
pub mod navigate;
pub(crate) mod progress;
pub mod search;

pub use auto::Auto;
pub use downloader::{Download, SaveOptions, transfer};
pub use navigate::{Hop, NavigationChain};
pub use search::{Aggregated, Pages, SearchEngine, search, search_by_filter};
