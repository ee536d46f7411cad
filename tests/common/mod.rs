//! 集成测试公用的本地站点。
//!
//! 在后台线程里用 axum 起一个模仿站点页面结构的 HTTP 服务，
//! 被测代码通过阻塞 reqwest 客户端访问它。

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::extract::{Form, Query, State};
use axum::http::header::{CONTENT_RANGE, CONTENT_TYPE, RANGE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use url::Url;

use fzmovies_downloader::{Session, SessionConfig};

pub const MOVIE_DETAIL: &str = include_str!("../fixtures/movie_detail.html");
pub const TO_DOWNLOAD: &str = include_str!("../fixtures/to_download.html");
pub const DOWNLOAD_LINKS: &str = include_str!("../fixtures/download_links.html");
pub const FINAL_LINK: &str = include_str!("../fixtures/final_link.html");
pub const EXPIRED: &str = include_str!("../fixtures/expired.html");
pub const ZERO_RESULTS: &str = include_str!("../fixtures/zero_results.html");
pub const SEARCH_RESULTS: &str = include_str!("../fixtures/search_results.html");

/// 本地站点的分页结果共 3 页，每页 2 部影片。
pub const RESULT_PAGES: usize = 3;
pub const MOVIES_PER_PAGE: usize = 2;
pub const MOVIE_FILE_PATH: &str = "/files/Heat.1995.720p.mp4";
pub const MOVIE_FILE_LEN: usize = 250_000;
/// 对续传请求回 206 且正文为空。
pub const DRAINED_FILE_PATH: &str = "/files/drained.mp4";
/// 忽略 Range，总是回 200 和完整正文。
pub const NO_RANGE_FILE_PATH: &str = "/files/no-range.mp4";

pub fn movie_bytes() -> Vec<u8> {
    (0..MOVIE_FILE_LEN).map(|i| (i % 251) as u8).collect()
}

#[derive(Default)]
pub struct SiteState {
    pub bootstraps: AtomicUsize,
    /// 非文件请求上出现 Range 头的次数。
    pub leaked_ranges: AtomicUsize,
    hits: Mutex<HashMap<String, usize>>,
    last_search: Mutex<Option<SearchForm>>,
}

impl SiteState {
    fn hit(&self, path: &str) -> usize {
        let mut hits = self.hits.lock().unwrap();
        let n = hits.entry(path.to_string()).or_insert(0);
        *n += 1;
        *n
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn bootstraps(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    pub fn leaked_ranges(&self) -> usize {
        self.leaked_ranges.load(Ordering::SeqCst)
    }

    pub fn last_search(&self) -> Option<SearchForm> {
        self.last_search.lock().unwrap().clone()
    }

    fn page_request(&self, path: &str, headers: &HeaderMap) -> usize {
        if headers.contains_key(RANGE) {
            self.leaked_ranges.fetch_add(1, Ordering::SeqCst);
        }
        self.hit(path)
    }
}

pub struct FixtureSite {
    pub base: Url,
    pub state: Arc<SiteState>,
}

impl FixtureSite {
    pub fn start() -> Self {
        let state = Arc::new(SiteState::default());
        let (tx, rx) = mpsc::channel::<SocketAddr>();
        let app = router(Arc::clone(&state));

        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .expect("fixture runtime");
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind fixture site");
                tx.send(listener.local_addr().expect("local addr"))
                    .expect("report fixture address");
                axum::serve(listener, app).await.expect("serve fixture site");
            });
        });

        let addr = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("fixture site did not start");
        Self {
            base: Url::parse(&format!("http://{addr}/")).unwrap(),
            state,
        }
    }

    pub fn session(&self) -> Session {
        Session::new(SessionConfig {
            base_url: self.base.clone(),
            request_timeout: Duration::from_secs(5),
            ..SessionConfig::default()
        })
        .unwrap()
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }
}

fn router(state: Arc<SiteState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.php", get(index))
        .route("/csearch.php", get(search_page).post(search_submit))
        .route("/imdb250.php", get(listing))
        .route("/download1.php", get(to_download))
        .route("/download.php", get(download_links))
        .route("/dlink.php", get(final_link))
        .route(MOVIE_FILE_PATH, get(movie_file))
        .route("/files/empty.bin", get(empty_file))
        .route(DRAINED_FILE_PATH, get(drained_file))
        .route(NO_RANGE_FILE_PATH, get(no_range_file))
        .fallback(movie_page)
        .with_state(state)
}

type Shared = State<Arc<SiteState>>;

async fn index(State(state): Shared, headers: HeaderMap) -> Response {
    state.page_request("/", &headers);
    state.bootstraps.fetch_add(1, Ordering::SeqCst);
    (
        [(SET_COOKIE, "PHPSESSID=fixture-session; Path=/")],
        Html("<html><head><title>Fzmovies</title></head><body>home</body></html>"),
    )
        .into_response()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchForm {
    pub searchname: String,
    #[serde(rename = "Search")]
    pub search: String,
    pub searchby: String,
    pub category: String,
    pub vsearch: String,
}

async fn search_submit(
    State(state): Shared,
    headers: HeaderMap,
    Form(form): Form<SearchForm>,
) -> Response {
    state.page_request("/csearch.php", &headers);
    let zero = form.searchname == "nothing";
    let single = form.searchname == "single";
    *state.last_search.lock().unwrap() = Some(form);
    if zero {
        return Html(ZERO_RESULTS).into_response();
    }
    if single {
        return Html(SEARCH_RESULTS).into_response();
    }
    Html(results_page(1)).into_response()
}

#[derive(Deserialize)]
struct PageQuery {
    pg: Option<usize>,
}

async fn search_page(State(state): Shared, headers: HeaderMap, Query(q): Query<PageQuery>) -> Response {
    state.page_request("/csearch.php", &headers);
    Html(results_page(q.pg.unwrap_or(1))).into_response()
}

async fn listing(State(state): Shared, headers: HeaderMap) -> Response {
    state.page_request("/imdb250.php", &headers);
    Html(results_page(1)).into_response()
}

/// 生成第 `pg` 页结果；影片地址形如 `movie-P2M1--hmp4.htm`。
pub fn results_page(pg: usize) -> String {
    let mut body = String::new();
    for i in 0..MOVIES_PER_PAGE {
        body.push_str(&format!(
            r#"<div class="mainbox"><table><tr>
              <td><a href="movie-P{pg}M{i}--hmp4.htm"><img src="imdb_images/p{pg}m{i}.jpg"></a></td>
              <td><span><small><b>Movie {pg}-{i}</b></small><br><small>(20{pg:02})</small><br>
              <small>Plot {pg}-{i}</small></span></td></tr></table></div>"#
        ));
    }
    body.push_str(r#"<div class="mainbox2">"#);
    if pg > 1 {
        body.push_str(r#"<a href="csearch.php?pg=1">First</a>"#);
        body.push_str(&format!(r#"<a href="csearch.php?pg={}">Prev</a>"#, pg - 1));
    }
    if pg < RESULT_PAGES {
        body.push_str(&format!(r#"<a href="csearch.php?pg={}">Next</a>"#, pg + 1));
        body.push_str(&format!(r#"<a href="csearch.php?pg={RESULT_PAGES}">Last</a>"#));
    }
    body.push_str("</div>");
    format!("<html><head><title>Results page {pg}</title></head><body>{body}</body></html>")
}

async fn movie_page(State(state): Shared, headers: HeaderMap, uri: Uri) -> Response {
    let path = uri.path();
    if !path.ends_with(".htm") {
        return StatusCode::NOT_FOUND.into_response();
    }
    let n = state.page_request(path, &headers);
    match path {
        // 首次访问过期，重新引导后恢复
        "/movie-Expired--hmp4.htm" if n == 1 => Html(EXPIRED).into_response(),
        "/movie-Dead--hmp4.htm" => Html(EXPIRED).into_response(),
        _ => Html(MOVIE_DETAIL).into_response(),
    }
}

/// 记录一次页面访问；带查询串的访问另按完整地址计数，返回后者的次数。
fn keyed_request(state: &SiteState, path: &str, uri: &Uri, headers: &HeaderMap) -> usize {
    state.page_request(path, headers);
    match uri.query() {
        Some(query) => state.hit(&format!("{path}?{query}")),
        None => 1,
    }
}

/// `downloadoptionskey=expired` 首次访问返回过期页。
/// 下一跳地址为 `download.php?downloadkey=k{key}`。
async fn to_download(
    State(state): Shared,
    headers: HeaderMap,
    uri: Uri,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let n = keyed_request(&state, "/download1.php", &uri, &headers);
    let key = q.get("downloadoptionskey").map(String::as_str).unwrap_or("222");
    if key == "expired" && n == 1 {
        return Html(EXPIRED).into_response();
    }
    Html(TO_DOWNLOAD.replace("downloadkey=k222", &format!("downloadkey=k{key}"))).into_response()
}

/// `downloadkey=klinks-expired` 首次访问返回过期页。
async fn download_links(
    State(state): Shared,
    headers: HeaderMap,
    uri: Uri,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let n = keyed_request(&state, "/download.php", &uri, &headers);
    if q.get("downloadkey").map(String::as_str) == Some("klinks-expired") && n == 1 {
        return Html(EXPIRED).into_response();
    }
    Html(DOWNLOAD_LINKS).into_response()
}

/// `id=expired` 首次访问返回过期页。
async fn final_link(
    State(state): Shared,
    headers: HeaderMap,
    uri: Uri,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let n = keyed_request(&state, "/dlink.php", &uri, &headers);
    if q.get("id").map(String::as_str) == Some("expired") && n == 1 {
        return Html(EXPIRED).into_response();
    }
    Html(FINAL_LINK).into_response()
}

async fn movie_file(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit(MOVIE_FILE_PATH);
    let body = movie_bytes();
    let total = body.len();

    let start = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.trim_end_matches('-').parse::<usize>().ok());

    match start {
        Some(start) if start >= total => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(CONTENT_RANGE, format!("bytes */{total}"))],
        )
            .into_response(),
        Some(start) => (
            StatusCode::PARTIAL_CONTENT,
            [
                (CONTENT_TYPE, "video/mp4".to_string()),
                (CONTENT_RANGE, format!("bytes {start}-{}/{total}", total - 1)),
            ],
            body[start..].to_vec(),
        )
            .into_response(),
        None => (StatusCode::OK, [(CONTENT_TYPE, "video/mp4")], body).into_response(),
    }
}

async fn empty_file(State(state): Shared) -> Response {
    state.hit("/files/empty.bin");
    (StatusCode::OK, [(CONTENT_TYPE, "application/octet-stream")], Vec::<u8>::new()).into_response()
}

async fn drained_file(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit(DRAINED_FILE_PATH);
    if !headers.contains_key(RANGE) {
        return (StatusCode::OK, [(CONTENT_TYPE, "video/mp4")], movie_bytes()).into_response();
    }
    (
        StatusCode::PARTIAL_CONTENT,
        [(CONTENT_TYPE, "video/mp4")],
        Vec::<u8>::new(),
    )
        .into_response()
}

async fn no_range_file(State(state): Shared) -> Response {
    state.hit(NO_RANGE_FILE_PATH);
    (StatusCode::OK, [(CONTENT_TYPE, "video/mp4")], movie_bytes()).into_response()
}
