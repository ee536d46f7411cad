//! HTML 解析辅助：选择器缓存、文本规整、链接补全。

use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{FzError, Result};

/// 编译一次复用的 CSS 选择器，选择器均为静态字面量。
macro_rules! selector {
    ($css:literal) => {{
        static SEL: std::sync::OnceLock<scraper::Selector> = std::sync::OnceLock::new();
        SEL.get_or_init(|| scraper::Selector::parse($css).unwrap())
    }};
}

pub(crate) use selector;

// ── 文本 ────────────────────────────────────────────────────────

/// 元素内全部文本，连续空白折叠为单个空格。
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 去掉 `()[]{}` 括号，用于年份、发行信息与计数串。
pub(crate) fn strip_brackets(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}'))
        .collect()
}

/// 解析 `12,345` 这类带千分位的计数。
pub(crate) fn parse_count(token: &str) -> Option<u64> {
    let digits: String = token.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

pub(crate) fn page_title(doc: &Html) -> Option<String> {
    doc.select(selector!("title"))
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

// ── 属性与链接 ──────────────────────────────────────────────────

pub(crate) fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub(crate) fn required_attr<'a>(
    el: ElementRef<'a>,
    name: &str,
    page: &'static str,
    what: &str,
) -> Result<&'a str> {
    attr(el, name).ok_or_else(|| FzError::malformed(page, format!("{what} has no {name}")))
}

/// 站点大量使用相对链接，统一按站点根补全。
pub(crate) fn absolute(base: &Url, raw: &str) -> Result<Url> {
    Ok(base.join(raw.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_and_counts() {
        assert_eq!(strip_brackets("(2019) [x] {y}"), "2019 x y");
        assert_eq!(parse_count("54,321"), Some(54321));
        assert_eq!(parse_count("hits"), None);
    }

    #[test]
    fn text_is_whitespace_normalized() {
        let doc = Html::parse_fragment("<p>  Hobbs &amp;\n   Shaw </p>");
        let p = doc.select(selector!("p")).next().unwrap();
        assert_eq!(text_of(p), "Hobbs & Shaw");
    }

    #[test]
    fn relative_links_become_absolute() {
        let base = Url::parse("https://fzmovies.net/").unwrap();
        assert_eq!(
            absolute(&base, " movie-Heat--hmp4.htm ").unwrap().as_str(),
            "https://fzmovies.net/movie-Heat--hmp4.htm"
        );
        assert_eq!(
            absolute(&base, "https://cdn.example.org/a.jpg")
                .unwrap()
                .as_str(),
            "https://cdn.example.org/a.jpg"
        );
    }
}
