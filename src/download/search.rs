//! 搜索引擎：执行一次查询，并沿 "next" 链接聚合多页结果。

use tracing::{debug, info};

use super::models::SearchResultPage;
use crate::error::{FzError, Result};
use crate::network_parser::filters::{Filter, PageTarget, QueryTarget, SearchBy, SearchCategory};
use crate::network_parser::session::Session;
use crate::page_parser::parse_search_page;

/// 持有会话引用与一个查询策略；每个实例对应一页结果。
pub struct SearchEngine {
    session: Session,
    filter: Filter,
    latest: Option<SearchResultPage>,
}

impl SearchEngine {
    pub fn new(session: Session, filter: Filter) -> Self {
        Self {
            session,
            filter,
            latest: None,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// 最近一次 `results()` 的结果。
    pub fn latest(&self) -> Option<&SearchResultPage> {
        self.latest.as_ref()
    }

    pub fn html_contents(&self) -> Result<String> {
        self.session.ensure_ready()?;
        match self.filter.target(self.session.base_url())? {
            QueryTarget::Get(url) => self.session.fetch(&url),
            QueryTarget::Post { url, form } => {
                let pairs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (*k, v.as_str())).collect();
                self.session.post_form(&url, &pairs)
            }
        }
    }

    /// 抓取并解析本页；零结果以 `ZeroSearchResults` 返回。
    pub fn results(&mut self) -> Result<SearchResultPage> {
        let html = self.html_contents()?;
        let page = parse_search_page(&html, self.session.base_url())?;
        info!(
            target: "search",
            filter = %self.filter.label(),
            movies = page.movies.len(),
            has_next = page.has_next(),
            "获取搜索结果"
        );
        self.latest = Some(page.clone());
        Ok(page)
    }

    pub fn first(&self) -> Result<SearchEngine> {
        self.navigate_to(PageTarget::First)
    }

    pub fn previous(&self) -> Result<SearchEngine> {
        self.navigate_to(PageTarget::Previous)
    }

    pub fn next(&self) -> Result<SearchEngine> {
        self.navigate_to(PageTarget::Next)
    }

    pub fn last(&self) -> Result<SearchEngine> {
        self.navigate_to(PageTarget::Last)
    }

    pub fn navigate_to(&self, target: PageTarget) -> Result<SearchEngine> {
        let latest = self.latest.as_ref().ok_or(FzError::NotQueried)?;
        let filter = Filter::navigate(latest, target)?;
        Ok(SearchEngine::new(self.session.clone(), filter))
    }

    /// 惰性逐页抓取；累计影片数达到 `limit` 或没有下一页时停止。
    ///
    /// 上限在整页合并后才检查，结果数可能超出 `limit` 至多一页。
    pub fn pages(self, limit: usize) -> Pages {
        Pages {
            pending: Some(self),
            total: 0,
            limit,
        }
    }

    pub fn all_results(self, limit: usize) -> Result<SearchResultPage> {
        let mut merged: Option<SearchResultPage> = None;
        for page in self.pages(limit) {
            let page = page?;
            match merged.as_mut() {
                Some(acc) => acc.merge(page),
                None => merged = Some(page),
            }
        }
        // 首页要么返回结果、要么已作为错误返回
        merged.ok_or(FzError::NotQueried)
    }

    pub fn aggregate(self, stream: bool, limit: usize) -> Result<Aggregated> {
        if stream {
            Ok(Aggregated::Stream(self.pages(limit)))
        } else {
            self.all_results(limit).map(Aggregated::Merged)
        }
    }
}

pub enum Aggregated {
    Merged(SearchResultPage),
    Stream(Pages),
}

/// 拉取式的多页结果序列，只能消费一次；中途丢弃不会遗留任何资源。
pub struct Pages {
    pending: Option<SearchEngine>,
    total: usize,
    limit: usize,
}

impl Pages {
    pub fn has_next(&self) -> bool {
        self.pending.is_some()
    }

    pub fn fetched_movies(&self) -> usize {
        self.total
    }
}

impl Iterator for Pages {
    type Item = Result<SearchResultPage>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut engine = self.pending.take()?;
        let page = match engine.results() {
            Ok(page) => page,
            Err(err) => return Some(Err(err)),
        };
        self.total += page.movies.len();

        if page.has_next() && self.total < self.limit {
            match engine.next() {
                Ok(next) => self.pending = Some(next),
                Err(err) => return Some(Err(err)),
            }
        } else {
            debug!(target: "search", total = self.total, limit = self.limit, "分页聚合结束");
        }
        Some(Ok(page))
    }
}

// ── 边界操作 ────────────────────────────────────────────────────

pub fn search(
    session: &Session,
    query: &str,
    searchby: SearchBy,
    category: SearchCategory,
) -> Result<SearchResultPage> {
    search_by_filter(session, Filter::search(query, searchby, category))
}

pub fn search_by_filter(session: &Session, filter: Filter) -> Result<SearchResultPage> {
    SearchEngine::new(session.clone(), filter).results()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::session::SessionConfig;

    #[test]
    fn navigation_before_query_is_rejected() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let engine = SearchEngine::new(session, Filter::ImdbTop250);
        assert!(matches!(engine.next(), Err(FzError::NotQueried)));
        assert!(matches!(engine.first(), Err(FzError::NotQueried)));
        assert!(engine.latest().is_none());
    }

    #[test]
    fn fresh_stream_reports_pending_page() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let pages = SearchEngine::new(session, Filter::ImdbTop250).pages(20);
        assert!(pages.has_next());
        assert_eq!(pages.fetched_movies(), 0);
    }
}
