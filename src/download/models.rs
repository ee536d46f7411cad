//! 搜索、解析、下载各阶段之间传递的数据模型。
//!
//! 全部是不可变的值记录，由产出它的阶段持有，交给下一阶段后不再修改。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FzError, Result};

/// 站点缺少发行信息时的默认值。
pub const UNKNOWN_DISTRIBUTION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub url: Url,
    pub title: String,
    pub year: i32,
    pub distribution: String,
    pub about: String,
    pub cover_photo: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultPage {
    pub movies: Vec<MovieSummary>,
    pub first_page: Option<Url>,
    pub previous_page: Option<Url>,
    pub next_page: Option<Url>,
    pub last_page: Option<Url>,
}

impl SearchResultPage {
    /// 追加后续页：影片按抓取顺序拼接，翻页指针取最后一页的。
    pub fn merge(&mut self, later: SearchResultPage) {
        self.movies.extend(later.movies);
        self.first_page = later.first_page;
        self.previous_page = later.previous_page;
        self.next_page = later.next_page;
        self.last_page = later.last_page;
    }

    pub fn has_next(&self) -> bool {
        self.next_page.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub title: String,
    pub url: Url,
    /// 原样保留站点显示的大小文本，例如 `1.2 GB`。
    pub size: String,
    pub hits: u64,
    pub mediainfo: Url,
    pub screenshot: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedMovie {
    pub title: String,
    pub url: Url,
    pub cover_photo: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetail {
    /// 站点惯例：0 为低清晰度，1 为高清晰度。
    pub files: Vec<FileEntry>,
    pub trailer: Option<Url>,
    pub recommended: Vec<RecommendedMovie>,
}

impl MovieDetail {
    pub fn file(&self, index: usize) -> Result<&FileEntry> {
        self.files.get(index).ok_or(FzError::IndexOutOfRange {
            what: "file",
            index,
            len: self.files.len(),
        })
    }

    pub fn file_for(&self, quality: Quality) -> Result<&FileEntry> {
        self.file(quality.file_index())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadCandidate {
    pub url: Url,
    pub connections: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadBundle {
    pub filename: String,
    pub size: String,
    pub info: String,
    /// 保证非空；0 号为无人值守流程的默认选择。
    pub links: Vec<DownloadCandidate>,
}

impl DownloadBundle {
    pub fn link(&self, index: usize) -> Result<&DownloadCandidate> {
        self.links.get(index).ok_or(FzError::IndexOutOfRange {
            what: "link",
            index,
            len: self.links.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
}

impl Quality {
    pub fn file_index(self) -> usize {
        match self {
            Quality::P480 => 0,
            Quality::P720 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::P480 => "480p",
            Quality::P720 => "720p",
        }
    }
}

impl FromStr for Quality {
    type Err = FzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480p" => Ok(Quality::P480),
            "720p" => Ok(Quality::P720),
            _ => Err(FzError::InvalidArgument {
                name: "quality",
                value: s.to_string(),
                allowed: vec!["480p", "720p"],
            }),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次传输的状态；除磁盘上的部分文件外不做持久化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    pub target_path: PathBuf,
    /// 本次响应的 content-length 加上已在磁盘上的字节数。
    pub total_size: u64,
    pub bytes_on_disk: u64,
    pub chunk_size: usize,
}

impl TransferState {
    pub fn is_resuming(&self) -> bool {
        self.bytes_on_disk > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// 续传时发现目标已完整，文件未被改动。
    AlreadyComplete(PathBuf),
}

impl SaveOutcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            SaveOutcome::Saved(p) | SaveOutcome::AlreadyComplete(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub written_mb: f64,
    pub total_mb: f64,
}

pub type ProgressCallback = Box<dyn FnMut(ProgressSnapshot) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://fzmovies.net/").unwrap().join(path).unwrap()
    }

    fn movie(title: &str) -> MovieSummary {
        MovieSummary {
            url: url(&format!("movie-{title}.htm")),
            title: title.to_string(),
            year: 2019,
            distribution: UNKNOWN_DISTRIBUTION.to_string(),
            about: String::new(),
            cover_photo: url("cover.jpg"),
        }
    }

    #[test]
    fn merge_concatenates_and_takes_later_pointers() {
        let mut first = SearchResultPage {
            movies: vec![movie("a"), movie("b")],
            next_page: Some(url("list.php?pg=2")),
            last_page: Some(url("list.php?pg=3")),
            ..Default::default()
        };
        let second = SearchResultPage {
            movies: vec![movie("c")],
            previous_page: Some(url("list.php?pg=1")),
            ..Default::default()
        };
        first.merge(second);

        let titles: Vec<_> = first.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
        assert!(!first.has_next());
        assert!(first.last_page.is_none());
        assert_eq!(first.previous_page, Some(url("list.php?pg=1")));
    }

    #[test]
    fn quality_maps_to_listing_index() {
        assert_eq!("720P".parse::<Quality>().unwrap().file_index(), 1);
        assert_eq!(Quality::P480.file_index(), 0);
        assert!("1080p".parse::<Quality>().is_err());
    }

    #[test]
    fn out_of_range_file_is_an_error() {
        let detail = MovieDetail {
            files: Vec::new(),
            trailer: None,
            recommended: Vec::new(),
        };
        assert!(matches!(
            detail.file_for(Quality::P720),
            Err(FzError::IndexOutOfRange { index: 1, len: 0, .. })
        ));
    }
}
