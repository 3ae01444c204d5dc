/// 卡片使用的响应式宽度
const CARD_WIDTHS: [u32; 5] = [144, 240, 320, 480, 720];

const CARD_SIZES: &str =
    "(max-width: 480px) 144px, (max-width: 768px) 240px, (max-width: 1200px) 320px, 360px";

const PROXY_BASE: &str = "https://images.weserv.nl/";

/// 图片代理地址
///
/// 空地址和站内 `/static/` 资源原样返回；其余去掉协议后交给 weserv 缩放并转成 webp。
pub fn proxy_image(url: &str, width: u32, height: u32) -> String {
    if url.is_empty() || url.starts_with("/static/") {
        return url.to_string();
    }
    let bare = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    format!(
        "{}?url={}&w={}&h={}&fit=cover&output=webp",
        PROXY_BASE,
        urlencoding::encode(bare),
        width,
        height
    )
}

/// 保留协议的代理地址，附带质量参数，用于博客配图
pub fn proxy_image_full(url: &str, width: u32, height: u32) -> String {
    format!(
        "{}?url={}&w={}&h={}&fit=cover&output=webp&q=85",
        PROXY_BASE,
        urlencoding::encode(url),
        width,
        height
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponsiveSources {
    pub src: String,
    pub srcset: String,
    pub sizes: &'static str,
}

/// 3:4 卡片图片的 src / srcset / sizes
pub fn responsive_sources(url: &str) -> ResponsiveSources {
    let srcset = CARD_WIDTHS
        .iter()
        .map(|&w| format!("{} {}w", proxy_image(url, w, card_height(w)), w))
        .collect::<Vec<_>>()
        .join(", ");
    ResponsiveSources {
        src: proxy_image(url, 320, card_height(320)),
        srcset,
        sizes: CARD_SIZES,
    }
}

fn card_height(width: u32) -> u32 {
    (width as f64 * 4.0 / 3.0).round() as u32
}
