use std::path::Path;

pub mod html;
pub mod image;
pub mod markdown;

pub use html::{escape_attr, escape_html, script_json};
pub use image::{proxy_image, proxy_image_full, responsive_sources, ResponsiveSources};

/// 检查文件是否为 Markdown 文件
pub fn is_markdown_file<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    if let Some(ext) = path.extension() {
        ext == "md" || ext == "markdown"
    } else {
        false
    }
}

/// 截断到指定字符数，超出时加省略号
pub fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

/// 1234567 -> 1,234,567
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_extensions() {
        assert!(is_markdown_file("content/blog/a.md"));
        assert!(!is_markdown_file("content/blog/a.txt"));
    }

    #[test]
    fn text_helpers() {
        assert_eq!(truncate_chars("hello world", 5), "hello...");
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(999), "999");
    }
}
