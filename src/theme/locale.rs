use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// 页面语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

/// 卡片与导航中使用的固定文案
#[derive(Debug, Clone, Serialize)]
pub struct Labels {
    pub lang: &'static str,
    pub view_profile: &'static str,
    pub free: &'static str,
    pub verified_aria: &'static str,
    pub verified_title: &'static str,
    pub creator_alt: &'static str,
    pub home: &'static str,
    pub categories: &'static str,
    pub countries: &'static str,
    pub blog: &'static str,
}

const EN_LABELS: Labels = Labels {
    lang: "en",
    view_profile: "View Profile",
    free: "FREE",
    verified_aria: "Verified",
    verified_title: "Verified creator",
    creator_alt: "OnlyFans creator",
    home: "Home",
    categories: "Categories",
    countries: "Countries",
    blog: "Blog",
};

const ES_LABELS: Labels = Labels {
    lang: "es",
    view_profile: "Ver Perfil",
    free: "GRATIS",
    verified_aria: "Verificado",
    verified_title: "Creadora verificada",
    creator_alt: "creadora de OnlyFans",
    home: "Inicio",
    categories: "Categorías",
    countries: "Países",
    blog: "Blog",
};

const EN_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const ES_MONTHS: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
    "octubre", "noviembre", "diciembre",
];

const ES_MONTHS_SHORT: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }

    pub fn labels(self) -> &'static Labels {
        match self {
            Locale::En => &EN_LABELS,
            Locale::Es => &ES_LABELS,
        }
    }

    /// 站内路径前缀，英文为空
    pub fn prefix(self) -> &'static str {
        match self {
            Locale::En => "",
            Locale::Es => "/es",
        }
    }

    /// 给站内路径加上语言前缀
    pub fn path(self, path: &str) -> String {
        format!("{}{}", self.prefix(), path)
    }

    /// 长日期：January 5, 2026 / 5 de enero de 2026
    pub fn format_date_long(self, iso: &str) -> String {
        match parse_date(iso) {
            Some(date) => {
                let month = date.month0() as usize;
                match self {
                    Locale::En => format!("{} {}, {}", EN_MONTHS[month], date.day(), date.year()),
                    Locale::Es => {
                        format!("{} de {} de {}", date.day(), ES_MONTHS[month], date.year())
                    }
                }
            }
            None => iso.to_string(),
        }
    }

    /// 短日期：Jan 5, 2026 / 5 ene 2026
    pub fn format_date_short(self, iso: &str) -> String {
        match parse_date(iso) {
            Some(date) => {
                let month = date.month0() as usize;
                match self {
                    Locale::En => {
                        format!("{} {}, {}", &EN_MONTHS[month][..3], date.day(), date.year())
                    }
                    Locale::Es => {
                        format!("{} {} {}", date.day(), ES_MONTHS_SHORT[month], date.year())
                    }
                }
            }
            None => String::new(),
        }
    }
}

/// en / es / x-default 三条 hreflang 链接
pub fn hreflang_links(en_url: &str, es_url: &str) -> String {
    format!(
        "<link rel=\"alternate\" hreflang=\"en\" href=\"{en}\">\n\
         <link rel=\"alternate\" hreflang=\"es\" href=\"{es}\">\n\
         <link rel=\"alternate\" hreflang=\"x-default\" href=\"{en}\">",
        en = en_url,
        es = es_url
    )
}

fn parse_date(iso: &str) -> Option<NaiveDate> {
    let day = iso.get(..10).unwrap_or(iso);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_per_locale() {
        assert_eq!(Locale::En.format_date_long("2026-03-05"), "March 5, 2026");
        assert_eq!(Locale::Es.format_date_long("2026-03-05"), "5 de marzo de 2026");
        assert_eq!(Locale::En.format_date_short("2026-01-15T10:00:00Z"), "Jan 15, 2026");
        assert_eq!(Locale::Es.format_date_short("2026-01-15"), "15 ene 2026");
        assert_eq!(Locale::Es.format_date_short("soon"), "");
    }

    #[test]
    fn prefixes_and_codes() {
        assert_eq!(Locale::Es.path("/blog/"), "/es/blog/");
        assert_eq!(Locale::En.path("/blog/"), "/blog/");
        assert_eq!(Locale::Es.code(), "es");
        assert_eq!(Locale::Es.labels().free, "GRATIS");
    }
}
