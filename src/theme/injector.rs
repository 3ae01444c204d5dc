use tracing::warn;

use super::anchors::{Anchor, Matcher};

/// 模板注入器
///
/// 按调用顺序对模板做替换。锚点不存在时不修改文档，只记录下来，
/// 页面照常返回。
#[derive(Debug)]
pub struct Injector {
    page: &'static str,
    html: String,
    missed: Vec<&'static str>,
}

/// 注入结果
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub missed: Vec<&'static str>,
}

impl Injector {
    pub fn new(page: &'static str, template: impl Into<String>) -> Self {
        Self {
            page,
            html: template.into(),
            missed: Vec::new(),
        }
    }

    /// 替换锚点（第一个匹配）
    pub fn replace(&mut self, anchor: &'static Anchor, with: &str) -> &mut Self {
        if !self.try_replace(anchor, with) {
            self.miss(anchor);
        }
        self
    }

    /// 替换锚点，缺失时不记录
    pub fn try_replace(&mut self, anchor: &Anchor, with: &str) -> bool {
        match &anchor.matcher {
            Matcher::Literal(text) => match self.html.find(text) {
                Some(pos) => {
                    self.html.replace_range(pos..pos + text.len(), with);
                    true
                }
                None => false,
            },
            Matcher::Pattern(re) => {
                let Some(caps) = re.captures(&self.html) else {
                    return false;
                };
                let Some(whole) = caps.get(0) else {
                    return false;
                };
                let replacement = match (caps.get(1), caps.get(2)) {
                    (Some(open), Some(close)) => {
                        format!("{}{}{}", open.as_str(), with, close.as_str())
                    }
                    _ => with.to_string(),
                };
                let range = whole.range();
                self.html.replace_range(range, &replacement);
                true
            }
        }
    }

    /// 在锚点之前插入内容
    pub fn insert_before(&mut self, anchor: &'static Anchor, markup: &str) -> &mut Self {
        let found = match &anchor.matcher {
            Matcher::Literal(text) => self.html.find(text),
            Matcher::Pattern(re) => re.find(&self.html).map(|m| m.start()),
        };
        match found {
            Some(pos) => {
                let mut block = String::with_capacity(markup.len() + 1);
                block.push_str(markup);
                if !markup.ends_with('\n') {
                    block.push('\n');
                }
                self.html.insert_str(pos, &block);
            }
            None => self.miss(anchor),
        }
        self
    }

    /// 存在则替换，否则在 `fallback` 之前插入 `markup`
    pub fn replace_or_insert(
        &mut self,
        anchor: &'static Anchor,
        with: &str,
        fallback: &'static Anchor,
        markup: &str,
    ) -> &mut Self {
        if !self.try_replace(anchor, with) {
            self.insert_before(fallback, markup);
        }
        self
    }

    pub fn missed(&self) -> &[&'static str] {
        &self.missed
    }

    pub fn finish(self) -> Rendered {
        Rendered {
            html: self.html,
            missed: self.missed,
        }
    }

    fn miss(&mut self, anchor: &'static Anchor) {
        warn!(page = self.page, anchor = anchor.name, "模板锚点缺失，跳过注入");
        if !self.missed.contains(&anchor.name) {
            self.missed.push(anchor.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::anchors::{CANONICAL, HEAD_END, RESULTS_GRID, TITLE};

    const TEMPLATE: &str = "<html><head><title>Old</title>\n\
        <link id=\"canonicalLink\" rel=\"canonical\" href=\"/old\">\n</head>\
        <body><div id=\"results\" class=\"row\"></div></body></html>";

    #[test]
    fn replaces_inside_capture_groups() {
        let mut injector = Injector::new("test", TEMPLATE);
        injector
            .replace(&TITLE, "New $1 title")
            .replace(&CANONICAL, "https://example.com/new/")
            .replace(&RESULTS_GRID, "\n<p>cards</p>\n");
        let out = injector.finish();
        assert!(out.missed.is_empty());
        assert!(out.html.contains("<title>New $1 title</title>"));
        assert!(out.html.contains(r#"id="canonicalLink" rel="canonical" href="https://example.com/new/""#));
        assert!(out.html.contains("<div id=\"results\" class=\"row\">\n<p>cards</p>\n</div>"));
    }

    #[test]
    fn missing_anchor_is_a_recorded_no_op() {
        let mut injector = Injector::new("test", "<p>plain</p>");
        injector.replace(&TITLE, "x").insert_before(&HEAD_END, "<meta>");
        let out = injector.finish();
        assert_eq!(out.html, "<p>plain</p>");
        assert_eq!(out.missed, vec!["<title>", "</head>"]);
    }

    #[test]
    fn replace_or_insert_falls_back_to_head() {
        let mut injector = Injector::new("test", "<head></head>");
        injector.replace_or_insert(&CANONICAL, "/x", &HEAD_END, "<link rel=\"canonical\" href=\"/x\">");
        let out = injector.finish();
        assert_eq!(out.html, "<head><link rel=\"canonical\" href=\"/x\">\n</head>");
        assert!(out.missed.is_empty());
    }
}
