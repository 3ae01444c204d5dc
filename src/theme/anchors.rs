//! 模板锚点
//!
//! 每个锚点要么是一段字面文本，要么是一个正则。带两个捕获组的正则在替换时
//! 保留两侧的捕获内容，只替换中间部分。

use once_cell::sync::Lazy;
use regex::Regex;

pub enum Matcher {
    Literal(&'static str),
    Pattern(Lazy<Regex>),
}

pub struct Anchor {
    pub name: &'static str,
    pub matcher: Matcher,
}

impl Anchor {
    /// 模板中是否存在该锚点
    pub fn is_present(&self, html: &str) -> bool {
        match &self.matcher {
            Matcher::Literal(text) => html.contains(text),
            Matcher::Pattern(re) => re.is_match(html),
        }
    }
}

macro_rules! pattern {
    ($re:expr) => {
        Matcher::Pattern(Lazy::new(|| {
            Regex::new($re).expect("hardcoded anchor regex is invalid - fix source code")
        }))
    };
}

pub static HEAD_END: Anchor = Anchor {
    name: "</head>",
    matcher: Matcher::Literal("</head>"),
};

pub static BODY_OPEN: Anchor = Anchor {
    name: "<body",
    matcher: Matcher::Literal("<body"),
};

pub static HTML_OPEN: Anchor = Anchor {
    name: "<html>",
    matcher: pattern!(r"(?m)^<!DOCTYPE html>\s*<html[^>]*>"),
};

pub static TITLE: Anchor = Anchor {
    name: "<title>",
    matcher: pattern!(r"(<title[^>]*>)[^<]*(</title>)"),
};

pub static META_DESCRIPTION: Anchor = Anchor {
    name: "meta description",
    matcher: pattern!(r#"(<meta name="description"[^>]*content=")[^"]*(")"#),
};

pub static CANONICAL: Anchor = Anchor {
    name: "canonical link",
    matcher: pattern!(r#"(<link[^>]+rel="canonical"[^>]+href=")[^"]*(")"#),
};

pub static CATEGORY_H1: Anchor = Anchor {
    name: "#catH1",
    matcher: pattern!(r#"(<h1 id="catH1"[^>]*>)[^<]*(</h1>)"#),
};

pub static CATEGORY_SUBTITLE: Anchor = Anchor {
    name: "#catSubtitle",
    matcher: pattern!(r#"(<p id="catSubtitle"[^>]*>)[^<]*(</p>)"#),
};

pub static PAGE_H1: Anchor = Anchor {
    name: "<h1>",
    matcher: pattern!(r"(<h1[^>]*>)[^<]*(</h1>)"),
};

pub static RESULTS_GRID: Anchor = Anchor {
    name: "#results",
    matcher: pattern!(r#"(<div[^>]*\bid="results"[^>]*>)\s*(</div>)"#),
};

pub static POPULAR_GRID: Anchor = Anchor {
    name: "#popularGrid",
    matcher: pattern!(r#"(<div id="popularGrid"[^>]*>)\s*(</div>)"#),
};

pub static CHIP_GRID: Anchor = Anchor {
    name: "#chipGrid",
    matcher: pattern!(r#"(<div id="chipGrid"[^>]*>)\s*(</div>)"#),
};

pub static BLOG_GRID: Anchor = Anchor {
    name: "#blogGrid",
    matcher: pattern!(
        r#"(<div class="blog-grid" id="blogGrid">)[\s\S]*?(</div>\s*\n\s*<div class="load-more-wrap")"#
    ),
};

pub static ARTICLE_MAIN: Anchor = Anchor {
    name: "#articleMain",
    matcher: pattern!(r#"(<main id="articleMain">)[\s\S]*?(</main>)"#),
};

/// 首页（en / es）
pub fn home_page() -> Vec<&'static Anchor> {
    vec![&BODY_OPEN, &CANONICAL, &HEAD_END, &RESULTS_GRID]
}

/// 分类列表页
pub fn category_page() -> Vec<&'static Anchor> {
    vec![
        &TITLE,
        &META_DESCRIPTION,
        &CANONICAL,
        &HEAD_END,
        &CATEGORY_H1,
        &CATEGORY_SUBTITLE,
        &RESULTS_GRID,
    ]
}

/// 国家页面；canonical 缺失时插入，不算缺失
pub fn country_page() -> Vec<&'static Anchor> {
    vec![&TITLE, &META_DESCRIPTION, &HEAD_END, &RESULTS_GRID]
}

pub fn categories_hub() -> Vec<&'static Anchor> {
    vec![&HEAD_END, &POPULAR_GRID, &CHIP_GRID, &BODY_OPEN]
}

pub fn blog_list() -> Vec<&'static Anchor> {
    vec![&HTML_OPEN, &TITLE, &META_DESCRIPTION, &CANONICAL, &HEAD_END, &BLOG_GRID]
}

pub fn blog_post() -> Vec<&'static Anchor> {
    vec![&TITLE, &META_DESCRIPTION, &CANONICAL, &HEAD_END, &ARTICLE_MAIN]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_grid_matches_both_attribute_orders() {
        assert!(RESULTS_GRID.is_present(r#"<div id="results" class="row g-3"></div>"#));
        assert!(RESULTS_GRID.is_present(r#"<div class="row" id="results">  </div>"#));
        assert!(!RESULTS_GRID.is_present(r#"<div class="row" id="results-x"></div>"#));
    }

    #[test]
    fn canonical_matches_with_extra_attributes() {
        assert!(CANONICAL.is_present(r#"<link id="canonicalLink" rel="canonical" href="/x">"#));
        assert!(CANONICAL.is_present(r#"<link rel="canonical" id="pageCanonical" href="/x">"#));
        assert!(!CANONICAL.is_present(r#"<link rel="alternate" href="/x">"#));
    }
}
