//! 影片详情页解析：预告片、推荐列表与文件列表。

use scraper::{ElementRef, Html};
use url::Url;

use super::html_utils::{
    absolute, attr, parse_count, required_attr, selector, strip_brackets, text_of,
};
use crate::download::models::{FileEntry, MovieDetail, RecommendedMovie};
use crate::error::{FzError, Result};

const PAGE: &str = "movie detail";

pub fn parse_movie_page(html: &str, base: &Url) -> Result<MovieDetail> {
    let doc = Html::parse_document(html);

    // 并非每部影片都有预告片
    let trailer = doc
        .select(selector!("iframe[allow]"))
        .find(|f| {
            attr(*f, "allow")
                .map(|a| a.contains("encrypted-media"))
                .unwrap_or(false)
        })
        .and_then(|f| attr(f, "src"))
        .map(|src| absolute(base, src))
        .transpose()?;

    let carousel = doc
        .select(selector!("div.owl-carousel.owl-theme"))
        .next()
        .ok_or_else(|| FzError::malformed(PAGE, "recommendation carousel is missing"))?;
    let recommended = carousel
        .select(selector!("a"))
        .map(|a| parse_recommended(a, base))
        .collect::<Result<Vec<_>>>()?;

    let mut files = Vec::new();
    for block in doc.select(selector!("ul.moviesfiles")) {
        let links: Vec<ElementRef<'_>> = block.select(selector!("a")).collect();
        if links.is_empty() {
            continue;
        }
        files.push(parse_file_block(block, &links, base)?);
    }
    if files.is_empty() {
        return Err(FzError::malformed(PAGE, "no downloadable files listed"));
    }

    Ok(MovieDetail {
        files,
        trailer,
        recommended,
    })
}

fn parse_recommended(a: ElementRef<'_>, base: &Url) -> Result<RecommendedMovie> {
    let img = a
        .select(selector!("img"))
        .next()
        .ok_or_else(|| FzError::malformed(PAGE, "recommended movie has no cover"))?;
    Ok(RecommendedMovie {
        title: attr(a, "alt")
            .or_else(|| attr(img, "alt"))
            .map(str::to_string)
            .unwrap_or_else(|| text_of(a)),
        url: absolute(base, required_attr(a, "href", PAGE, "recommended movie")?)?,
        cover_photo: absolute(base, required_attr(img, "src", PAGE, "recommended cover")?)?,
    })
}

fn parse_file_block(block: ElementRef<'_>, links: &[ElementRef<'_>], base: &Url) -> Result<FileEntry> {
    let title_link = links[0];
    let mediainfo = links
        .get(1)
        .ok_or_else(|| FzError::malformed(PAGE, "file entry has no mediainfo link"))?;

    let counter = block
        .select(selector!("dcounter"))
        .next()
        .map(text_of)
        .ok_or_else(|| FzError::malformed(PAGE, "file entry has no size/hits counter"))?;
    let (size, hits) = parse_counter(&counter)?;

    let screenshot = links
        .get(2)
        .and_then(|a| attr(*a, "href"))
        .map(|href| absolute(base, href))
        .transpose()?;

    Ok(FileEntry {
        title: text_of(title_link),
        url: absolute(base, required_attr(title_link, "href", PAGE, "file link")?)?,
        size,
        hits,
        mediainfo: absolute(base, required_attr(*mediainfo, "href", PAGE, "mediainfo link")?)?,
        screenshot,
    })
}

/// `(1.01 GB) (54,321 hits) (...)`：前两个词为大小，倒数第三个为下载次数。
fn parse_counter(raw: &str) -> Result<(String, u64)> {
    let stripped = strip_brackets(raw);
    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(FzError::malformed(PAGE, format!("counter '{raw}' is too short")));
    }
    let size = tokens[..2].join(" ");
    let hits_token = tokens[tokens.len() - 3];
    let hits = parse_count(hits_token)
        .ok_or_else(|| FzError::malformed(PAGE, format!("hits '{hits_token}' is not a number")))?;
    Ok((size, hits))
}
