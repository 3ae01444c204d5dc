use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::core::state::AppState;
use crate::error::SiteResult;
use crate::handlers::{plain, HtmlPage};
use crate::models::catalog::{category_to_slug, title_case};
use crate::theme::renderer::ChipView;
use crate::theme::{anchors, jsonld, Injector};

/// 分类汇总页的缓存策略
pub const HUB_CACHE: &str = "public, s-maxage=3600, stale-while-revalidate=300";

/// 分类汇总页：热门分类与全部分类的链接
pub async fn categories_hub(state: &AppState) -> Response {
    let template = match state.templates.get("categories.html").await {
        Ok(template) => template,
        Err(e) => {
            error!(page = "categories", "无法读取模板 categories.html: {}", e);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    match render_hub(state, &template) {
        Ok(page) => page.into_response(),
        Err(e) => {
            warn!(page = "categories", error = %e, "分类汇总页渲染失败，返回静态模板");
            HtmlPage::new(&*template).into_response()
        }
    }
}

fn render_hub(state: &AppState, template: &str) -> SiteResult<HtmlPage> {
    let popular = chips(&state.catalog.popular);
    let all = chips(&state.catalog.sorted_categories());

    let base = state.base_url();
    let site = &state.config.site.name;
    let url = format!("{}/categories/", base);
    let home = format!("{}/", base);
    let items: Vec<(String, String)> = all
        .iter()
        .map(|chip| (chip.label.clone(), format!("{}{}", base, chip.href)))
        .collect();
    let json_ld = jsonld::script(&jsonld::collection_page(
        &format!("OnlyFans Categories | {}", site),
        &format!(
            "Browse {} OnlyFans creator categories on {}. Find creators by niche, style and content type.",
            all.len(),
            site
        ),
        &url,
        &[("Home", home.as_str()), ("Categories", url.as_str())],
        "OnlyFans Creator Categories",
        &items,
    ));

    let popular_html = render_chips(state, &popular)?;
    let all_html = render_chips(state, &all)?;

    let mut page = Injector::new("categories", template);
    page.insert_before(&anchors::HEAD_END, &json_ld)
        .replace(&anchors::POPULAR_GRID, &format!("\n{}\n", popular_html))
        .replace(&anchors::CHIP_GRID, &format!("\n{}\n", all_html))
        .replace(
            &anchors::BODY_OPEN,
            &format!(
                "<body data-ssr=\"true\" data-categories-count=\"{}\"",
                popular.len() + all.len()
            ),
        );
    Ok(HtmlPage::rendered(page.finish()).cache(HUB_CACHE))
}

fn chips(categories: &[String]) -> Vec<ChipView> {
    categories
        .iter()
        .map(|category| ChipView {
            href: format!("/categories/{}/", category_to_slug(category)),
            label: title_case(category),
        })
        .collect()
}

fn render_chips(state: &AppState, chips: &[ChipView]) -> SiteResult<String> {
    Ok(chips
        .iter()
        .map(|chip| state.fragments.chip(chip))
        .collect::<SiteResult<Vec<_>>>()?
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chips_link_to_slugged_categories() {
        let chips = chips(&["big booty".to_string(), "Fitness".to_string()]);
        assert_eq!(chips[0].href, "/categories/big-booty/");
        assert_eq!(chips[0].label, "Big Booty");
        assert_eq!(chips[1].href, "/categories/fitness/");
    }
}
