use serde::Serialize;
use std::collections::HashMap;
use tera::{Context as TeraContext, Tera};
use tracing::{debug, error};

use super::locale::{Labels, Locale};
use crate::error::SiteResult;
use crate::models::{Config, Creator};
use crate::utils::{escape_attr, escape_html, responsive_sources, ResponsiveSources};

const NO_IMAGE: &str = "/static/no-image.png";

/// 编译进二进制的片段模板
const TEMPLATES: [(&str, &str); 7] = [
    ("creator_card.html", include_str!("../../templates/creator_card.html")),
    ("category_chip.html", include_str!("../../templates/category_chip.html")),
    ("blog_card.html", include_str!("../../templates/blog_card.html")),
    ("article.html", include_str!("../../templates/article.html")),
    ("creator_profile.html", include_str!("../../templates/creator_profile.html")),
    ("creator_not_found.html", include_str!("../../templates/creator_not_found.html")),
    ("fallback_redirect.html", include_str!("../../templates/fallback_redirect.html")),
];

/// 片段渲染器
#[derive(Clone)]
pub struct FragmentRenderer {
    tera: Tera,
}

/// 创作者卡片
#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub name: String,
    pub username: String,
    pub image: CardImage,
    pub fallback: String,
    /// `None` 表示免费
    pub price: Option<String>,
    pub verified: bool,
    pub profile_url: String,
    pub eager: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardImage {
    pub src: String,
    pub srcset: String,
    pub sizes: &'static str,
}

impl From<ResponsiveSources> for CardImage {
    fn from(sources: ResponsiveSources) -> Self {
        Self {
            src: sources.src,
            srcset: sources.srcset,
            sizes: sources.sizes,
        }
    }
}

impl CardView {
    pub fn from_creator(creator: &Creator, index: usize, config: &Config) -> Self {
        let fallback = card_image_url(creator);
        let name = match creator.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "Unknown".to_string(),
        };
        let profile_url = if creator.username.is_empty() {
            "#".to_string()
        } else {
            config.profile_url(&creator.username)
        };
        Self {
            name,
            username: creator.username.clone(),
            image: responsive_sources(&fallback).into(),
            fallback,
            price: format_price(creator.subscribe_price),
            verified: creator.is_verified,
            profile_url,
            eager: index == 0,
        }
    }
}

/// 卡片使用的原始图片，非 http 地址换成占位图
pub fn card_image_url(creator: &Creator) -> String {
    let avatar = creator.avatar_url();
    if avatar.starts_with("http") {
        avatar.to_string()
    } else {
        NO_IMAGE.to_string()
    }
}

/// 订阅价格；0 或缺失视为免费
pub fn format_price(price: Option<f64>) -> Option<String> {
    match price {
        Some(p) if p > 0.0 && p.is_finite() => Some(format!("${:.2}", p)),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChipView {
    pub href: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogCardView {
    pub url: String,
    pub image: Option<String>,
    pub image_alt: String,
    pub emoji: String,
    pub tag: String,
    pub title: String,
    pub excerpt: String,
    pub date: String,
    pub read_time: String,
    pub eager: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    pub back_url: String,
    pub back_label: String,
    pub emoji: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub read_time: String,
    pub category: String,
    pub hero: Option<HeroImage>,
    pub body_html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeroImage {
    pub desktop: String,
    pub mobile: String,
    pub alt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatView {
    pub label: &'static str,
    pub value: String,
}

/// 创作者详情页
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub display_name: String,
    pub username: String,
    pub meta_description: String,
    pub canonical_url: String,
    pub og_image: String,
    pub avatar_thumb: String,
    pub header_image: String,
    pub profile_url: String,
    pub profile_host: String,
    pub verified: bool,
    pub price: String,
    pub stats: Vec<StatView>,
    /// 已转义，换行替换为 `<br>`
    pub bio_html: String,
    pub json_ld: String,
    pub hydration: String,
}

impl FragmentRenderer {
    pub fn new() -> SiteResult<Self> {
        let mut tera = Tera::default();
        // 转义由 esc / attr 过滤器显式完成
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        Self::register_filters(&mut tera);
        debug!("已加载 {} 个片段模板", TEMPLATES.len());
        Ok(Self { tera })
    }

    fn register_filters(tera: &mut Tera) {
        tera.register_filter("esc", Self::esc_filter);
        tera.register_filter("attr", Self::attr_filter);
    }

    fn esc_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        Ok(tera::Value::String(escape_html(&value_text(value))))
    }

    fn attr_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        Ok(tera::Value::String(escape_attr(&value_text(value))))
    }

    fn render(&self, template: &str, context: &TeraContext) -> SiteResult<String> {
        self.tera.render(template, context).map_err(|e| {
            error!("片段渲染失败 {}: {}", template, e);
            e.into()
        })
    }

    pub fn creator_card(&self, card: &CardView, labels: &Labels) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("card", card);
        context.insert("labels", labels);
        self.render("creator_card.html", &context)
    }

    /// 渲染一组卡片，第一张优先加载
    pub fn creator_cards(&self, creators: &[Creator], locale: Locale, config: &Config) -> SiteResult<String> {
        let labels = locale.labels();
        let cards = creators
            .iter()
            .enumerate()
            .map(|(i, c)| self.creator_card(&CardView::from_creator(c, i, config), labels))
            .collect::<SiteResult<Vec<_>>>()?;
        Ok(cards.iter().map(|c| c.trim_end()).collect::<Vec<_>>().join("\n"))
    }

    pub fn chip(&self, chip: &ChipView) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("chip", chip);
        Ok(self.render("category_chip.html", &context)?.trim_end().to_string())
    }

    pub fn blog_card(&self, card: &BlogCardView) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("card", card);
        Ok(self.render("blog_card.html", &context)?.trim_end().to_string())
    }

    pub fn article(&self, article: &ArticleView) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("article", article);
        Ok(self.render("article.html", &context)?.trim_end().to_string())
    }

    pub fn creator_profile(&self, page: &ProfileView) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("page", page);
        self.render("creator_profile.html", &context)
    }

    pub fn creator_not_found(&self, username: &str, site_name: &str) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("username", username);
        context.insert("site_name", site_name);
        self.render("creator_not_found.html", &context)
    }

    pub fn fallback_redirect(&self, target: &str) -> SiteResult<String> {
        let mut context = TeraContext::new();
        context.insert("target", target);
        self.render("fallback_redirect.html", &context)
    }
}

fn value_text(value: &tera::Value) -> String {
    match value {
        tera::Value::String(s) => s.clone(),
        tera::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creator(value: serde_json::Value) -> Creator {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn card_shows_price_badge_and_escapes() {
        let renderer = FragmentRenderer::new().unwrap();
        let config = Config::default();
        let c = creator(json!({
            "username": "amy",
            "name": "Amy <3",
            "avatar": "https://cdn.example.com/a.jpg",
            "subscribeprice": 4.5,
            "isverified": true
        }));
        let html = renderer.creator_cards(&[c], Locale::En, &config).unwrap();
        assert!(html.contains("$4.50"));
        assert!(html.contains("Amy &lt;3"));
        assert!(html.contains(r#"aria-label="Verified""#));
        assert!(html.contains(r#"loading="eager" fetchpriority="high""#));
        assert!(html.contains("https://onlyfans.com/amy"));
        assert!(html.contains("View Profile"));
    }

    #[test]
    fn card_scripts_read_values_from_data_attributes() {
        let renderer = FragmentRenderer::new().unwrap();
        let config = Config::default();
        let c = creator(json!({"username": "o'neil", "avatar": "https://cdn.example.com/a'b.jpg"}));
        let html = renderer.creator_cards(&[c], Locale::En, &config).unwrap();
        assert!(html.contains("toggleFavorite(this.dataset.username,this)"));
        assert!(html.contains("this.src=this.dataset.fallback"));
        assert!(html.contains(r#"data-username="o&#39;neil""#));
        assert!(html.contains(r#"data-fallback="https://cdn.example.com/a&#39;b.jpg""#));
    }

    #[test]
    fn free_card_in_spanish_uses_placeholder_image() {
        let renderer = FragmentRenderer::new().unwrap();
        let config = Config::default();
        let c = creator(json!({"username": "bea", "subscribeprice": 0, "avatar": "/local.png"}));
        let html = renderer.creator_cards(&[c.clone(), c], Locale::Es, &config).unwrap();
        assert!(html.contains("GRATIS"));
        assert!(html.contains("Ver Perfil"));
        assert!(html.contains("/static/no-image.png"));
        assert!(html.contains("Unknown"));
        assert_eq!(html.matches(r#"loading="lazy""#).count(), 1);
    }

    #[test]
    fn not_found_page_is_noindex() {
        let renderer = FragmentRenderer::new().unwrap();
        let html = renderer.creator_not_found("<ghost>", "Demo").unwrap();
        assert!(html.contains(r#"<meta name="robots" content="noindex, nofollow">"#));
        assert!(html.contains("@&lt;ghost&gt;"));
    }
}
