use thiserror::Error;

/// 站点错误类型
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("上游未配置: 缺少 SUPABASE_URL 或 SUPABASE_KEY")]
    MissingUpstream,

    #[error("上游返回错误: {status} - {body}")]
    Upstream {
        status: u16,
        body: String,
    },

    /// PostgREST 在 offset 超出总数时返回 416
    #[error("请求范围超出结果集")]
    RangeNotSatisfiable,

    #[error("上游请求超时 ({0} ms)")]
    Timeout(u64),

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("文件读取失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("模板渲染失败: {0}")]
    Template(#[from] tera::Error),

    #[error("配置错误: {message}")]
    Config {
        message: String,
    },
}

pub type SiteResult<T> = std::result::Result<T, SiteError>;
