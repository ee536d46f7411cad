//! 查询构造：自由搜索、站点榜单与翻页导航。
//!
//! 每个 [`Filter`] 变体确定性地映射为一个 GET 地址或一次 POST 表单提交。
//! 所有参数都先按允许集合校验，非法值不会发到网络上。

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::download::models::SearchResultPage;
use crate::error::{FzError, Result};

/// 为只接受固定取值的参数生成枚举、`FromStr` 与 `Display`。
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn allowed() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl FromStr for $name {
            type Err = FzError;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s.trim())
                    .ok_or_else(|| FzError::InvalidArgument {
                        name: $label,
                        value: s.to_string(),
                        allowed: Self::allowed(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(SearchBy, "searchby" {
    Name => "Name",
    Director => "Director",
    Starcast => "Starcast",
});

choice_enum!(
    /// 自由搜索可用的分类。
    SearchCategory, "category" {
        All => "All",
        Bollywood => "Bollywood",
        Hollywood => "Hollywood",
        DHollywood => "DHollywood",
    }
);

choice_enum!(
    /// 榜单页面只区分两个分类，对应站点的 `catID`。
    ListingCategory, "category" {
        Bollywood => "Bollywood",
        Hollywood => "Hollywood",
    }
);

choice_enum!(OscarsAward, "oscars category" {
    BestPicture => "Best Picture",
    BestCinematography => "Best Cinematography",
    BestOriginalScore => "Best Original Score",
    NominationsBestPicture => "Nominations - Best Picture",
    NominationsBestCinematography => "Nominations - Best Cinematography",
});

choice_enum!(
    /// 站点原样使用的字母区间（包括 `DtoC`、`MtO` 这种写法）。
    AlphaRange, "range" {
        AtoC => "AtoC",
        DtoC => "DtoC",
        GtoI => "GtoI",
        JtoL => "JtoL",
        MtO => "MtO",
        PtoR => "PtoR",
        StoU => "StoU",
        VtoZ => "VtoZ",
        Digits => "1to9",
    }
);

choice_enum!(Genre, "genre" {
    Action => "Action",
    Adventure => "Adventure",
    Animation => "Animation",
    Biography => "Biography",
    Comedy => "Comedy",
    Crime => "Crime",
    Documentary => "Documentary",
    Drama => "Drama",
    Family => "Family",
    Fantasy => "Fantasy",
    FilmNoir => "Film-Noir",
    History => "History",
    Horror => "Horror",
    Music => "Music",
    Musical => "Musical",
    Mystery => "Mystery",
    Romance => "Romance",
    SciFi => "Sci-Fi",
    Sport => "Sport",
    Thriller => "Thriller",
    War => "War",
    Western => "Western",
});

choice_enum!(PageTarget, "target" {
    First => "first",
    Previous => "previous",
    Next => "next",
    Last => "last",
});

choice_enum!(
    /// 外部调用方按名称选择榜单策略时使用。
    FilterKind, "filter" {
        ImdbTop250 => "imdb-top-250",
        Oscars => "oscars",
        MostDownloaded => "most-downloaded",
        RecentlyReleased => "recently-released",
        RecentlyPublished => "recently-published",
        Alphabetical => "alphabetical",
        Genre => "genre",
        ReleaseYear => "year",
        Tag => "tag",
    }
);

impl ListingCategory {
    pub fn cat_id(self) -> u8 {
        match self {
            ListingCategory::Bollywood => 1,
            ListingCategory::Hollywood => 2,
        }
    }
}

impl Default for ListingCategory {
    fn default() -> Self {
        ListingCategory::Hollywood
    }
}

const SEARCH_PATH: &str = "csearch.php";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    Get(Url),
    Post {
        url: Url,
        form: Vec<(&'static str, String)>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Search {
        query: String,
        searchby: SearchBy,
        category: SearchCategory,
    },
    ImdbTop250,
    Oscars(OscarsAward),
    MostDownloaded(ListingCategory),
    RecentlyReleased(ListingCategory),
    RecentlyPublished(ListingCategory),
    Alphabetical {
        range: AlphaRange,
        category: ListingCategory,
    },
    Genre {
        genre: Genre,
        category: ListingCategory,
    },
    ReleaseYear {
        year: i32,
        category: ListingCategory,
    },
    Tag(String),
    /// 指向某个已抓取结果页的 first/previous/next/last。
    Navigator { target: PageTarget, url: Url },
}

impl Filter {
    pub fn search(query: impl Into<String>, searchby: SearchBy, category: SearchCategory) -> Self {
        Filter::Search {
            query: query.into(),
            searchby,
            category,
        }
    }

    pub fn tag(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(FzError::InvalidArgument {
                name: "tag",
                value: tag.to_string(),
                allowed: Vec::new(),
            });
        }
        Ok(Filter::Tag(tag.to_string()))
    }

    pub fn release_year(year: Option<i32>, category: ListingCategory) -> Self {
        let year = year.unwrap_or_else(|| time::OffsetDateTime::now_utc().year());
        Filter::ReleaseYear { year, category }
    }

    /// 在给定结果页上沿 `target` 方向翻页；该方向无链接时失败。
    pub fn navigate(page: &SearchResultPage, target: PageTarget) -> Result<Self> {
        let url = match target {
            PageTarget::First => page.first_page.as_ref(),
            PageTarget::Previous => page.previous_page.as_ref(),
            PageTarget::Next => page.next_page.as_ref(),
            PageTarget::Last => page.last_page.as_ref(),
        }
        .ok_or(FzError::TargetPageUrlNotFound(target.as_str()))?;

        Ok(Filter::Navigator {
            target,
            url: url.clone(),
        })
    }

    /// 按名称与字符串参数构造榜单策略，参数缺省时取站点默认值。
    pub fn build(kind: FilterKind, arg: Option<&str>, category: Option<&str>) -> Result<Self> {
        let category = category
            .map(str::parse::<ListingCategory>)
            .transpose()?
            .unwrap_or_default();

        Ok(match kind {
            FilterKind::ImdbTop250 => Filter::ImdbTop250,
            FilterKind::Oscars => Filter::Oscars(
                arg.map(str::parse)
                    .transpose()?
                    .unwrap_or(OscarsAward::BestPicture),
            ),
            FilterKind::MostDownloaded => Filter::MostDownloaded(category),
            FilterKind::RecentlyReleased => Filter::RecentlyReleased(category),
            FilterKind::RecentlyPublished => Filter::RecentlyPublished(category),
            FilterKind::Alphabetical => Filter::Alphabetical {
                range: arg.map(str::parse).transpose()?.unwrap_or(AlphaRange::AtoC),
                category,
            },
            FilterKind::Genre => Filter::Genre {
                genre: arg.map(str::parse).transpose()?.unwrap_or(Genre::Action),
                category,
            },
            FilterKind::ReleaseYear => {
                let year = arg
                    .map(|raw| {
                        raw.trim().parse::<i32>().map_err(|_| FzError::InvalidArgument {
                            name: "year",
                            value: raw.to_string(),
                            allowed: Vec::new(),
                        })
                    })
                    .transpose()?;
                Filter::release_year(year, category)
            }
            FilterKind::Tag => Filter::tag(arg.unwrap_or_default())?,
        })
    }

    pub fn label(&self) -> String {
        match self {
            Filter::Search {
                query, searchby, ..
            } => format!("search '{query}' by {searchby}"),
            Filter::ImdbTop250 => "imdb-top-250".to_string(),
            Filter::Oscars(award) => format!("oscars {award}"),
            Filter::MostDownloaded(c) => format!("most-downloaded {c}"),
            Filter::RecentlyReleased(c) => format!("recently-released {c}"),
            Filter::RecentlyPublished(c) => format!("recently-published {c}"),
            Filter::Alphabetical { range, category } => format!("alphabetical {range} {category}"),
            Filter::Genre { genre, category } => format!("genre {genre} {category}"),
            Filter::ReleaseYear { year, category } => format!("year {year} {category}"),
            Filter::Tag(tag) => format!("tag {tag}"),
            Filter::Navigator { target, .. } => format!("{target} page"),
        }
    }

    pub fn target(&self, base: &Url) -> Result<QueryTarget> {
        let listing = |path: &str, pairs: &[(&str, String)]| -> Result<QueryTarget> {
            let mut url = base.join(path)?;
            if !pairs.is_empty() {
                let mut query = url.query_pairs_mut();
                for (k, v) in pairs {
                    query.append_pair(k, v);
                }
            }
            Ok(QueryTarget::Get(url))
        };

        match self {
            Filter::Search {
                query,
                searchby,
                category,
            } => Ok(QueryTarget::Post {
                url: base.join(SEARCH_PATH)?,
                form: vec![
                    ("searchname", query.clone()),
                    ("Search", "Search".to_string()),
                    ("searchby", searchby.to_string()),
                    ("category", category.to_string()),
                    ("vsearch", String::new()),
                ],
            }),
            Filter::ImdbTop250 => listing("imdb250.php", &[]),
            Filter::Oscars(award) => {
                listing("oscars.php", &[("category", format!("Oscars {award}"))])
            }
            Filter::MostDownloaded(c) => listing("movieslist.php", &movies_list(*c, "downloads")),
            Filter::RecentlyReleased(c) => listing("movieslist.php", &movies_list(*c, "date")),
            Filter::RecentlyPublished(c) => listing("movieslist.php", &movies_list(*c, "latest")),
            Filter::Alphabetical { range, category } => listing(
                "alpha.php",
                &[
                    ("range", range.to_string()),
                    ("catID", category.cat_id().to_string()),
                ],
            ),
            Filter::Genre { genre, category } => listing(
                "genre.php",
                &[
                    ("catID", category.cat_id().to_string()),
                    ("genre", genre.to_string()),
                ],
            ),
            Filter::ReleaseYear { year, category } => listing(
                "year.php",
                &[
                    ("year", year.to_string()),
                    ("catID", category.cat_id().to_string()),
                ],
            ),
            Filter::Tag(tag) => listing("movietags.php", &[("tag", tag.clone())]),
            Filter::Navigator { url, .. } => Ok(QueryTarget::Get(url.clone())),
        }
    }
}

fn movies_list(category: ListingCategory, by: &str) -> [(&'static str, String); 2] {
    [
        ("catID", category.cat_id().to_string()),
        ("by", by.to_string()),
    ]
}
