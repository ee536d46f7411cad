//! 解析链：搜索结果 → 影片详情 → 文件选项 → 下载链接页 → 最终文件地址。
//!
//! 每一跳先校验输入地址形状，再抓取并解析。跳内遇到会话过期时，
//! 以过期页给出的链接重新引导会话并重试该跳一次；第二次过期直接返回。

use tracing::{debug, info, warn};
use url::Url;

use super::models::{DownloadBundle, DownloadCandidate, FileEntry, MovieDetail, MovieSummary};
use crate::error::{FzError, Result};
use crate::network_parser::session::Session;
use crate::page_parser::{
    parse_download_links_page, parse_final_page, parse_movie_page, parse_to_download_page,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    MoviePage,
    FileOption,
    DownloadKey,
    DownloadId,
}

impl Hop {
    pub fn name(self) -> &'static str {
        match self {
            Hop::MoviePage => "movie page",
            Hop::FileOption => "file option",
            Hop::DownloadKey => "download key",
            Hop::DownloadId => "download id",
        }
    }

    /// 输入地址不符合该跳的形状时属于调用方错误，不重试。
    pub fn check(self, url: &Url) -> Result<()> {
        let ok = match self {
            Hop::MoviePage => url.path().ends_with(".htm"),
            Hop::FileOption => url.as_str().contains("/download1.php?downloadoptionskey="),
            Hop::DownloadKey => url.as_str().contains("/download.php?downloadkey="),
            Hop::DownloadId => url.as_str().contains("/dlink.php?id="),
        };
        if ok {
            Ok(())
        } else {
            Err(FzError::NavigationPrecondition {
                hop: self.name(),
                url: url.to_string(),
            })
        }
    }
}

#[derive(Clone)]
pub struct NavigationChain {
    session: Session,
}

impl NavigationChain {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn navigate(&self, movie: &MovieSummary) -> Result<MovieDetail> {
        let detail = self.run_hop(Hop::MoviePage, &movie.url, parse_movie_page)?;
        info!(
            target: "navigate",
            title = %movie.title,
            files = detail.files.len(),
            "已解析影片详情"
        );
        Ok(detail)
    }

    pub fn resolve_links(&self, file: &FileEntry) -> Result<DownloadBundle> {
        let key_url = self.run_hop(Hop::FileOption, &file.url, parse_to_download_page)?;
        let bundle = self.run_hop(Hop::DownloadKey, &key_url, parse_download_links_page)?;
        info!(
            target: "navigate",
            filename = %bundle.filename,
            size = %bundle.size,
            links = bundle.links.len(),
            "已解析下载链接"
        );
        Ok(bundle)
    }

    /// 最终地址指向站点之外，除了是合法 URL 不再做形状校验。
    pub fn final_url(&self, candidate: &DownloadCandidate) -> Result<Url> {
        let url = self.run_hop(Hop::DownloadId, &candidate.url, parse_final_page)?;
        debug!(target: "navigate", url = %url, "最终文件地址");
        Ok(url)
    }

    fn run_hop<T>(
        &self,
        hop: Hop,
        url: &Url,
        parse: impl Fn(&str, &Url) -> Result<T>,
    ) -> Result<T> {
        hop.check(url)?;
        self.session.ensure_ready()?;

        let attempt = || -> Result<T> {
            let html = self.session.fetch(url)?;
            parse(&html, self.session.base_url())
        };

        match attempt() {
            Err(FzError::SessionExpired { redirect_to }) => {
                warn!(
                    target: "navigate",
                    hop = hop.name(),
                    redirect = %redirect_to,
                    "会话过期，重新引导后重试"
                );
                self.session.bootstrap(&redirect_to)?;
                attempt()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn hop_shapes() {
        assert!(Hop::MoviePage.check(&url("https://fzmovies.net/movie-Heat--hmp4.htm")).is_ok());
        assert!(
            Hop::FileOption
                .check(&url("https://fzmovies.net/download1.php?downloadoptionskey=9"))
                .is_ok()
        );
        assert!(
            Hop::DownloadKey
                .check(&url("https://fzmovies.net/download.php?downloadkey=x"))
                .is_ok()
        );
        assert!(Hop::DownloadId.check(&url("https://fzmovies.net/dlink.php?id=1")).is_ok());
    }

    #[test]
    fn wrong_record_for_hop_is_rejected_before_network() {
        // 默认会话指向真实站点；形状校验失败时不会发起任何请求
        let chain = NavigationChain::new(Session::new(Default::default()).unwrap());
        let candidate = DownloadCandidate {
            url: url("https://fzmovies.net/movie-Heat--hmp4.htm"),
            connections: 1,
        };
        let err = chain.final_url(&candidate).unwrap_err();
        assert!(matches!(
            err,
            FzError::NavigationPrecondition { hop: "download id", .. }
        ));
    }
}
