use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::theme::locale::Locale;

/// 分类目录：分类、热门分类、同义词、组合分类与国家页面
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// 所有分类（人类可读名称）
    pub categories: Vec<String>,
    /// 热门分类，顺序即展示顺序
    pub popular: Vec<String>,
    /// 同义词覆盖，键为分类名称或 slug
    pub synonyms: HashMap<String, Vec<String>>,
    /// 组合分类：搜索词 + 自动过滤条件
    pub compound: BTreeMap<String, CompoundCategory>,
    /// 国家页面
    pub countries: Vec<Country>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundCategory {
    pub search_term: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub filters: CategoryFilters,
    pub display_label: String,
}

/// 分类自带的过滤条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFilters {
    pub max_price: Option<f64>,
    pub verified: bool,
    pub bundles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub slug: String,
    pub terms: Vec<String>,
    pub en: CountryLocale,
    pub es: CountryLocale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryLocale {
    pub label: String,
    /// 相对 site_root 的模板文件
    pub template: String,
    pub h1: String,
    pub meta_description: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Country {
    pub fn locale(&self, locale: Locale) -> &CountryLocale {
        match locale {
            Locale::En => &self.en,
            Locale::Es => &self.es,
        }
    }
}

/// 解析后的分类查询条件
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCategory {
    pub slug: String,
    pub terms: Vec<String>,
    pub label: String,
    pub filters: Option<CategoryFilters>,
}

impl Catalog {
    /// 从 YAML 文件加载；文件不存在时返回空目录
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Catalog file not found: {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        let catalog: Catalog = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
        info!(
            categories = catalog.categories.len(),
            countries = catalog.countries.len(),
            "分类目录已加载"
        );
        Ok(catalog)
    }

    /// 每个分类 slug 的同义词表
    pub fn synonyms_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();

        for category in &self.categories {
            let slug = category_to_slug(category);
            let mut terms = base_variants(category);
            let overrides = self
                .synonyms
                .get(category.as_str())
                .or_else(|| self.synonyms.get(slug.as_str()));
            if let Some(extra) = overrides {
                for term in extra {
                    push_unique(&mut terms, term.trim());
                }
            }
            map.insert(slug, terms);
        }

        for (slug, def) in &self.compound {
            let terms = map.entry(slug.clone()).or_insert_with(Vec::new);
            let extra = if def.synonyms.is_empty() {
                vec![def.search_term.clone()]
            } else {
                def.synonyms.clone()
            };
            for term in &extra {
                push_unique(terms, term.trim());
            }
        }

        map
    }

    /// 将 slug 解析为搜索词、展示名称与过滤条件
    pub fn resolve(&self, slug: &str) -> ResolvedCategory {
        if let Some(def) = self.compound.get(slug) {
            let terms = if def.synonyms.is_empty() {
                vec![def.search_term.clone()]
            } else {
                def.synonyms.clone()
            };
            return ResolvedCategory {
                slug: slug.to_string(),
                terms,
                label: def.display_label.clone(),
                filters: Some(def.filters.clone()),
            };
        }

        let terms = match self.synonyms_map().remove(slug) {
            Some(terms) if !terms.is_empty() => terms,
            _ => vec![slug.replace('-', " ")],
        };
        ResolvedCategory {
            slug: slug.to_string(),
            terms,
            label: slug_to_label(slug),
            filters: None,
        }
    }

    pub fn country(&self, slug: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.slug == slug)
    }

    /// 按字母排序的分类
    pub fn sorted_categories(&self) -> Vec<String> {
        let mut all = self.categories.clone();
        all.sort_by_key(|c| c.to_lowercase());
        all
    }

    /// 所有分类 slug，按目录顺序
    pub fn category_slugs(&self) -> Vec<String> {
        self.categories.iter().map(|c| category_to_slug(c)).collect()
    }
}

/// 分类名称转 URL slug
pub fn category_to_slug(category: &str) -> String {
    category
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace(['(', ')'], "")
}

/// slug 转展示名称
pub fn slug_to_label(slug: &str) -> String {
    slug.split('-').map(capitalize).collect::<Vec<_>>().join(" ")
}

/// 按空格分词并首字母大写
pub fn title_case(text: &str) -> String {
    text.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn base_variants(label: &str) -> Vec<String> {
    let label = label.trim();
    if label.is_empty() {
        return Vec::new();
    }
    let words: Vec<&str> = label.split_whitespace().collect();
    let mut variants = Vec::new();
    push_unique(&mut variants, label);
    push_unique(&mut variants, &label.to_lowercase());
    push_unique(&mut variants, &words.join("-"));
    push_unique(&mut variants, &words.concat());
    if words.len() > 1 {
        push_unique(&mut variants, words[0]);
    }
    variants
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        serde_yaml::from_str(
            r#"
categories: ["fitness", "big cats", "teen (18+)", "goth-free"]
popular: ["fitness"]
synonyms:
  fitness: ["gym", "workout", "fitness"]
  big-cats: ["lions"]
compound:
  goth-free:
    search_term: goth
    synonyms: ["goth", "gothic"]
    filters: { max_price: 0 }
    display_label: "Goth (Free)"
"#,
        )
        .unwrap()
    }

    #[test]
    fn slugs_and_labels() {
        assert_eq!(category_to_slug("Big  Cats"), "big-cats");
        assert_eq!(category_to_slug("teen (18+)"), "teen-18+");
        assert_eq!(slug_to_label("big-cats"), "Big Cats");
        assert_eq!(title_case("foot fetish"), "Foot Fetish");
    }

    #[test]
    fn synonyms_merge_variants_and_overrides() {
        let map = sample().synonyms_map();
        assert_eq!(map["fitness"], vec!["fitness", "gym", "workout"]);
        assert_eq!(map["big-cats"], vec!["big cats", "big-cats", "bigcats", "big", "lions"]);
        assert!(map["goth-free"].contains(&"gothic".to_string()));
    }

    #[test]
    fn resolve_compound_and_fallback() {
        let catalog = sample();
        let goth = catalog.resolve("goth-free");
        assert_eq!(goth.terms, vec!["goth", "gothic"]);
        assert_eq!(goth.label, "Goth (Free)");
        assert_eq!(goth.filters.unwrap().max_price, Some(0.0));

        let unknown = catalog.resolve("red-hair");
        assert_eq!(unknown.terms, vec!["red hair"]);
        assert_eq!(unknown.label, "Red Hair");
        assert!(unknown.filters.is_none());
    }
}
