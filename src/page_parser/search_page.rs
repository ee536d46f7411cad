//! 搜索结果页 / 榜单页解析。

use scraper::{ElementRef, Html};
use url::Url;

use super::html_utils::{absolute, page_title, required_attr, selector, strip_brackets, text_of};
use crate::download::models::{MovieSummary, SearchResultPage, UNKNOWN_DISTRIBUTION};
use crate::error::{FzError, Result};

const PAGE: &str = "search results";

/// 解析一页搜索结果。
///
/// 结果块缺少元数据容器（`span`）或整页没有结果块时，返回 `ZeroSearchResults`，
/// 不会产出空页。
pub fn parse_search_page(html: &str, base: &Url) -> Result<SearchResultPage> {
    let doc = Html::parse_document(html);
    let zero = || {
        FzError::ZeroSearchResults(page_title(&doc).unwrap_or_else(|| "no movies found".into()))
    };

    let mut movies = Vec::new();
    for block in doc.select(selector!("div.mainbox")) {
        let Some(span) = block.select(selector!("span")).next() else {
            return Err(zero());
        };
        movies.push(parse_movie_block(block, span, base)?);
    }
    if movies.is_empty() {
        return Err(zero());
    }

    let mut page = SearchResultPage {
        movies,
        ..Default::default()
    };
    if let Some(pager) = doc.select(selector!("div.mainbox2")).next() {
        for link in pager.select(selector!("a[href]")) {
            let label = text_of(link).to_ascii_lowercase();
            let slot = if label.contains("first") {
                &mut page.first_page
            } else if label.contains("prev") {
                &mut page.previous_page
            } else if label.contains("next") {
                &mut page.next_page
            } else if label.contains("last") {
                &mut page.last_page
            } else {
                continue;
            };
            let href = required_attr(link, "href", PAGE, "page link")?;
            *slot = Some(absolute(base, href)?);
        }
    }
    Ok(page)
}

fn parse_movie_block(block: ElementRef<'_>, span: ElementRef<'_>, base: &Url) -> Result<MovieSummary> {
    let link = block
        .select(selector!("a"))
        .next()
        .ok_or_else(|| FzError::malformed(PAGE, "result block has no link"))?;
    let img = block
        .select(selector!("img"))
        .next()
        .ok_or_else(|| FzError::malformed(PAGE, "result block has no cover image"))?;

    let fragments: Vec<String> = span.select(selector!("small")).map(text_of).collect();
    let (title, year, distribution, about) = match fragments.as_slice() {
        [title, year, about] => (title, year, UNKNOWN_DISTRIBUTION.to_string(), about),
        [title, year, distribution, about] => {
            (title, year, strip_brackets(distribution).trim().to_string(), about)
        }
        other => {
            return Err(FzError::malformed(
                PAGE,
                format!("expected 3 or 4 text fragments, found {}", other.len()),
            ));
        }
    };

    let year_text = strip_brackets(year);
    let year = year_text
        .trim()
        .parse::<i32>()
        .map_err(|_| FzError::malformed(PAGE, format!("year '{}' is not a number", year_text.trim())))?;

    Ok(MovieSummary {
        url: absolute(base, required_attr(link, "href", PAGE, "result link")?)?,
        title: title.clone(),
        year,
        distribution,
        about: about.clone(),
        cover_photo: absolute(base, required_attr(img, "src", PAGE, "cover image")?)?,
    })
}
