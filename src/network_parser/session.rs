//! 进程级共享 HTTP 会话（Cookie + 默认请求头）。
//!
//! - 首次使用前加载站点首页以取得会话 Cookie；Cookie 缺失时惰性重建
//! - 任一 HTML 响应中出现下载密钥过期提示时，抛出带恢复链接的 `SessionExpired`
//! - 续传用的 Range 头通过 [`HeaderGuard`] 限定在单次下载调用内

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderName,
    HeaderValue, RANGE, REFERER, USER_AGENT,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FzError, Result};

/// 站点在下载密钥失效时嵌入页面的提示语（小写比较）。
pub const EXPIRED_MARKER: &str = "download keys have expired";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub session_cookie: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://fzmovies.net/").expect("static base url"),
            request_timeout: Duration::from_secs(20),
            user_agent:
                "Mozilla/5.0 (X11; Linux x86_64; rv:129.0) Gecko/20100101 Firefox/129.0"
                    .to_string(),
            session_cookie: "PHPSESSID".to_string(),
        }
    }
}

/// 共享会话句柄，克隆开销很小，所有克隆共用同一个 Cookie 罐与附加头集合。
///
/// 内部没有跨请求的锁：同一时刻只应有一条调用链在使用它（尤其是 Range 头）。
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: Client,
    jar: Arc<Jar>,
    config: SessionConfig,
    extra_headers: Mutex<HeaderMap>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        // 未启用 gzip 解码；identity 也保证 content-length 等于实际流式字节数
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        if let Ok(referer) = HeaderValue::from_str(config.base_url.as_str()) {
            default_headers.insert(REFERER, referer);
        }

        let jar = Arc::new(Jar::default());
        // 客户端级别不设总超时（大文件下载），页面请求逐个设置 request_timeout
        let client = Client::builder()
            .default_headers(default_headers)
            .cookie_provider(Arc::clone(&jar))
            .connect_timeout(config.request_timeout)
            .timeout(None)
            .build()?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                client,
                jar,
                config,
                extra_headers: Mutex::new(HeaderMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.config.base_url
    }

    /// 相对链接按站点根补全为绝对地址。
    pub fn absolute(&self, raw: &str) -> Result<Url> {
        Ok(self.base_url().join(raw.trim())?)
    }

    pub fn has_session_cookie(&self) -> bool {
        let Some(cookies) = self.inner.jar.cookies(self.base_url()) else {
            return false;
        };
        let prefix = format!("{}=", self.inner.config.session_cookie);
        cookies
            .to_str()
            .map(|raw| raw.split(';').any(|p| p.trim().starts_with(&prefix)))
            .unwrap_or(false)
    }

    /// 会话 Cookie 缺失时加载站点首页；成功加载首页是其它所有操作的前提。
    pub fn ensure_ready(&self) -> Result<()> {
        if self.has_session_cookie() {
            return Ok(());
        }
        let root = self.base_url().clone();
        self.bootstrap(&root)
    }

    /// 无条件地通过 `url` 重新引导会话（会话过期恢复时传入过期页给出的链接）。
    pub fn bootstrap(&self, url: &Url) -> Result<()> {
        info!(target: "session", url = %url, "加载首页以初始化会话");
        let resp = self.page_request(self.inner.client.get(url.clone())).send()?;
        let status = resp.status();
        if !status.is_success() {
            debug!(target: "session", headers = ?resp.headers(), "首页加载失败");
            return Err(FzError::LoadIndex {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(())
    }

    /// GET 页面并返回正文；HTML 正文出现过期提示时返回 `SessionExpired`。
    ///
    /// 不做任何重试，由调用方（跳转链）决定是否恢复。
    pub fn fetch(&self, url: &Url) -> Result<String> {
        debug!(target: "session", url = %url, "GET");
        let resp = self.page_request(self.inner.client.get(url.clone())).send()?;
        self.read_page(resp)
    }

    pub fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<String> {
        debug!(target: "session", url = %url, "POST");
        let resp = self
            .page_request(self.inner.client.post(url.clone()))
            .form(form)
            .send()?;
        self.read_page(resp)
    }

    /// 下载用的流式 GET：带上当前附加头，不设总超时，也不检查状态码。
    pub fn get_stream(&self, url: &Url) -> Result<Response> {
        let headers = self.lock_extra().clone();
        Ok(self.inner.client.get(url.clone()).headers(headers).send()?)
    }

    /// 设置续传 Range 头，返回的守卫在离开作用域时移除该头。
    pub fn set_range(&self, offset: u64) -> HeaderGuard {
        let value = HeaderValue::from_str(&format!("bytes={offset}-"))
            .unwrap_or(HeaderValue::from_static("bytes=0-"));
        self.scoped_header(RANGE, value)
    }

    pub fn scoped_header(&self, name: HeaderName, value: HeaderValue) -> HeaderGuard {
        self.lock_extra().insert(name.clone(), value);
        HeaderGuard {
            session: self.clone(),
            name,
        }
    }

    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.lock_extra().get(name).cloned()
    }

    fn page_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let headers = self.lock_extra().clone();
        builder
            .headers(headers)
            .timeout(self.inner.config.request_timeout)
    }

    fn read_page(&self, resp: Response) -> Result<String> {
        let resp = resp.error_for_status()?;
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(true);
        let body = resp.text()?;
        if is_html && let Some(redirect_to) = detect_session_expiry(&body, self.base_url())? {
            warn!(target: "session", redirect = %redirect_to, "下载密钥已过期");
            return Err(FzError::SessionExpired { redirect_to });
        }
        Ok(body)
    }

    fn lock_extra(&self) -> MutexGuard<'_, HeaderMap> {
        self.inner
            .extra_headers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 共享会话上的临时请求头，drop 时移除。
#[must_use = "the header is removed as soon as the guard is dropped"]
pub struct HeaderGuard {
    session: Session,
    name: HeaderName,
}

impl Drop for HeaderGuard {
    fn drop(&mut self) {
        self.session.lock_extra().remove(&self.name);
    }
}

fn re_href() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)href\s*=\s*['"]([^'"]+)['"]"#).unwrap())
}

/// 在正文中查找过期提示；找到时返回提示之后的第一个链接，缺省为站点根。
pub fn detect_session_expiry(body: &str, base: &Url) -> Result<Option<Url>> {
    let lower = body.to_ascii_lowercase();
    let Some(pos) = lower.find(EXPIRED_MARKER) else {
        return Ok(None);
    };
    let redirect = match re_href()
        .captures(&body[pos..])
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
    {
        Some(href) => base.join(href.trim())?,
        None => base.clone(),
    };
    Ok(Some(redirect))
}
