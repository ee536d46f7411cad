//! 下载链路中的中间页：跳转页、下载链接页与最终地址页。

use scraper::Html;
use url::Url;

use super::html_utils::{
    absolute, attr, collapse_ws, required_attr, selector, strip_brackets, text_of,
};
use crate::download::models::{DownloadBundle, DownloadCandidate};
use crate::error::{FzError, Result};

/// 文件选项页上唯一的 "proceed" 链接。
pub fn parse_to_download_page(html: &str, base: &Url) -> Result<Url> {
    let doc = Html::parse_document(html);
    let link = doc
        .select(selector!("a#downloadlink"))
        .next()
        .ok_or_else(|| FzError::malformed("to-download", "download link anchor is missing"))?;
    absolute(base, required_attr(link, "href", "to-download", "download link")?)
}

/// 只有页面上最后一个 `ul.downloadlinks` 中的条目是真实下载地址。
pub fn parse_download_links_page(html: &str, base: &Url) -> Result<DownloadBundle> {
    const PAGE: &str = "download links";
    let doc = Html::parse_document(html);

    let info = doc
        .select(selector!("textarea"))
        .next()
        .map(|t| collapse_ws(&t.text().collect::<String>()))
        .unwrap_or_default();

    let mut filename = None;
    let mut size = None;
    for span in doc.select(selector!("span[style]")) {
        let style: String = attr(span, "style")
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if filename.is_none() && style.contains("color:red") {
            filename = Some(text_of(span));
        } else if size.is_none() && style.contains("color:blue") {
            size = Some(text_of(span));
        }
    }
    let filename = filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| FzError::malformed(PAGE, "filename span is missing"))?;
    let size = size.ok_or_else(|| FzError::malformed(PAGE, "size span is missing"))?;

    let list = doc
        .select(selector!("ul.downloadlinks"))
        .last()
        .ok_or_else(|| FzError::malformed(PAGE, "no download link list"))?;

    let mut links = Vec::new();
    for item in list.select(selector!("li")) {
        let Some(a) = item.select(selector!("a[href]")).next() else {
            continue;
        };
        let counter = item
            .select(selector!("dcounter"))
            .next()
            .map(text_of)
            .ok_or_else(|| FzError::malformed(PAGE, "download link has no connections counter"))?;
        let connections = strip_brackets(&counter)
            .split_whitespace()
            .last()
            .and_then(|t| t.parse::<u64>().ok())
            .ok_or_else(|| FzError::malformed(PAGE, format!("connections '{counter}' is not a number")))?;
        links.push(DownloadCandidate {
            url: absolute(base, required_attr(a, "href", PAGE, "download link")?)?,
            connections,
        });
    }
    if links.is_empty() {
        return Err(FzError::malformed(PAGE, "download link list is empty"));
    }

    Ok(DownloadBundle {
        filename,
        size,
        info,
        links,
    })
}

/// 最终页只用来暴露可直接下载的文件地址。
pub fn parse_final_page(html: &str, base: &Url) -> Result<Url> {
    let doc = Html::parse_document(html);
    let input = doc
        .select(selector!("input[name=\"download1\"]"))
        .next()
        .ok_or_else(|| FzError::malformed("final link", "download1 input is missing"))?;
    absolute(base, required_attr(input, "value", "final link", "download1 input")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://fzmovies.net/").unwrap()
    }

    #[test]
    fn proceed_link_is_extracted() {
        let html = r#"<html><body><a id="downloadlink" href="download.php?downloadkey=abc">Download</a></body></html>"#;
        assert_eq!(
            parse_to_download_page(html, &base()).unwrap().as_str(),
            "https://fzmovies.net/download.php?downloadkey=abc"
        );
        assert!(parse_to_download_page("<html></html>", &base()).is_err());
    }

    #[test]
    fn only_last_link_list_counts() {
        let html = r#"<html><body>
            <textarea>  Use a download manager
               for faster downloads </textarea>
            <span style="color: red;">Heat.1995.720p.mp4</span>
            <span style="color:Blue">1.01 GB</span>
            <ul class="downloadlinks"><li><a href="ads.php">Ad</a><dcounter>(Connections: 1)</dcounter></li></ul>
            <ul class="downloadlinks">
              <li><a href="dlink.php?id=1">Link 1</a> <dcounter>(Connections: 20)</dcounter></li>
              <li><a href="dlink.php?id=2">Link 2</a> <dcounter>(Connections: 8)</dcounter></li>
            </ul></body></html>"#;
        let bundle = parse_download_links_page(html, &base()).unwrap();
        assert_eq!(bundle.filename, "Heat.1995.720p.mp4");
        assert_eq!(bundle.size, "1.01 GB");
        assert_eq!(bundle.info, "Use a download manager for faster downloads");
        assert_eq!(bundle.links.len(), 2);
        assert_eq!(bundle.links[0].connections, 20);
        assert_eq!(bundle.links[1].url.as_str(), "https://fzmovies.net/dlink.php?id=2");
    }

    #[test]
    fn empty_candidate_list_is_malformed() {
        let html = r#"<span style="color:red">a.mp4</span><span style="color:blue">1 GB</span>
            <ul class="downloadlinks"></ul>"#;
        assert!(matches!(
            parse_download_links_page(html, &base()),
            Err(FzError::Malformed { .. })
        ));
    }

    #[test]
    fn final_url_comes_from_input_value() {
        let html = r#"<form><input name="download1" value="https://dl.example.org/files/Heat.mp4"></form>"#;
        assert_eq!(
            parse_final_page(html, &base()).unwrap().as_str(),
            "https://dl.example.org/files/Heat.mp4"
        );
    }
}
