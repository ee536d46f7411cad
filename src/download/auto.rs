//! 自动模式：默认取第一个搜索结果，按清晰度选文件，用第一个下载地址保存。

use tracing::info;

use super::downloader::{Download, SaveOptions};
use super::models::{DownloadBundle, MovieSummary, Quality, SaveOutcome};
use super::navigate::NavigationChain;
use super::search::SearchEngine;
use crate::error::{FzError, Result};
use crate::network_parser::filters::Filter;
use crate::network_parser::session::Session;

pub struct Auto {
    session: Session,
    quality: Quality,
    movies: Vec<MovieSummary>,
    movie_index: usize,
    link_index: usize,
}

impl Auto {
    /// 立即执行搜索，并把第一个结果作为下载目标。
    pub fn new(session: Session, quality: Quality, filter: Filter) -> Result<Self> {
        let page = SearchEngine::new(session.clone(), filter).results()?;
        if page.movies.is_empty() {
            return Err(FzError::ZeroSearchResults("no movies found".to_string()));
        }
        Ok(Self {
            session,
            quality,
            movies: page.movies,
            movie_index: 0,
            link_index: 0,
        })
    }

    /// 改用第 `index` 个搜索结果。
    pub fn movie_index(mut self, index: usize) -> Result<Self> {
        if index >= self.movies.len() {
            return Err(FzError::IndexOutOfRange {
                what: "movie",
                index,
                len: self.movies.len(),
            });
        }
        self.movie_index = index;
        Ok(self)
    }

    /// 改用第 `index` 个下载地址；越界在 `save` 时报告。
    pub fn link_index(mut self, index: usize) -> Self {
        self.link_index = index;
        self
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn target(&self) -> &MovieSummary {
        &self.movies[self.movie_index]
    }

    /// 走完前三跳，返回下载链接页的内容。
    pub fn resolve(&self) -> Result<DownloadBundle> {
        let chain = NavigationChain::new(self.session.clone());
        let detail = chain.navigate(self.target())?;
        let file = detail.file_for(self.quality)?;
        chain.resolve_links(file)
    }

    /// `filename` 留空时使用下载链接页给出的文件名。
    pub fn save(&self, bundle: &DownloadBundle, mut options: SaveOptions) -> Result<SaveOutcome> {
        let candidate = bundle.link(self.link_index)?.clone();
        if options.filename.trim().is_empty() {
            options.filename = bundle.filename.clone();
        }
        info!(
            target: "download",
            title = %self.target().title,
            quality = %self.quality,
            filename = %options.filename,
            link = self.link_index,
            "自动模式下载"
        );
        Download::new(self.session.clone(), candidate).save(options)
    }

    pub fn run(&self, options: SaveOptions) -> Result<SaveOutcome> {
        let bundle = self.resolve()?;
        self.save(&bundle, options)
    }
}
