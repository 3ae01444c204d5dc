use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use super::escape_attr;

/// 博客正文 Markdown 转 HTML
///
/// 段落内的单个换行输出为 `<br>`，链接统一加 `rel="noopener noreferrer"`。
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Start(Tag::Link(_, dest, title)) => Event::Html(open_link(&dest, &title)),
        Event::End(Tag::Link(..)) => Event::Html(CowStr::Borrowed("</a>")),
        other => other,
    });

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, parser);
    html_output
}

fn open_link(dest: &str, title: &str) -> CowStr<'static> {
    let title = if title.is_empty() {
        String::new()
    } else {
        format!(" title=\"{}\"", escape_attr(title))
    };
    CowStr::from(format!(
        "<a href=\"{}\"{} rel=\"noopener noreferrer\">",
        escape_attr(dest),
        title
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_gfm_extensions() {
        let out = render("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n");
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<table>"));
        assert!(out.contains("<del>gone</del>"));
        assert!(out.contains("checkbox"));
    }

    #[test]
    fn links_and_line_breaks() {
        let out = render("first line\nsecond [home](/ \"Go\")\n\n```rust\nlet x = 1 < 2;\n```\n");
        assert!(out.contains("first line<br />"));
        assert!(out.contains("<a href=\"/\" title=\"Go\" rel=\"noopener noreferrer\">home</a>"));
        assert!(out.contains("<code class=\"language-rust\">let x = 1 &lt; 2;"));
    }
}
