//! 站点页面到数据模型的纯函数解析。
//!
//! 子模块：
//! - `html_utils`    — 选择器缓存、文本规整、链接补全
//! - `search_page`   — 搜索结果 / 榜单页
//! - `movie_page`    — 影片详情页
//! - `download_page` — 跳转页、下载链接页、最终地址页

pub(crate) mod html_utils;
pub mod download_page;
pub mod movie_page;
pub mod search_page;

pub use download_page::{parse_download_links_page, parse_final_page, parse_to_download_page};
pub use movie_page::parse_movie_page;
pub use search_page::parse_search_page;
