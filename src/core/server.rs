use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::state::SharedState;
use crate::handlers::{api, pages};

/// HTTP 服务器
pub struct Server {
    state: SharedState,
    /// 端口
    port: u16,
}

impl Server {
    pub fn new(state: SharedState, port: u16) -> Self {
        Self { state, port }
    }

    /// 启动服务器
    pub async fn start(self) -> Result<()> {
        let app = router(self.state);
        let addr: SocketAddr = format!("0.0.0.0:{}", self.port).parse()?;
        info!("Server started at http://localhost:{}", self.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// 全部路由；未匹配的路径交给站点目录下的静态文件
pub fn router(state: SharedState) -> Router {
    let site_root = state.config.paths.site_root.clone();
    let cors = state.config.server.cors;

    let api_routes = Router::new()
        .route("/search", get(api::search))
        .route("/wishlist", get(api::wishlist))
        .route("/reel", get(api::reel))
        .route("/blog", get(api::blog))
        .route("/blog-post", get(api::blog_post))
        .route("/categories", get(pages::categories_hub))
        .route("/health", get(api::health))
        .route("/sitemap.xml", get(api::sitemap))
        .route("/creator", get(pages::creator))
        .route("/creator/:username", get(pages::creator_path))
        .route("/creator-redirect", get(pages::creator_redirect))
        .route("/ssr/home", get(pages::home))
        .route("/ssr/es-home", get(pages::es_home))
        .route("/ssr/category", get(pages::category))
        .route("/ssr/es-category", get(pages::es_category))
        .route("/ssr/country", get(pages::country))
        .route("/ssr/es-country", get(pages::es_country))
        .route("/ssr/blog", get(pages::blog_list))
        .route("/ssr/es-blog", get(pages::es_blog_list))
        .route("/ssr/blog-post", get(pages::blog_post))
        .route("/ssr/categories-hub", get(pages::categories_hub));

    let clean_urls = Router::new()
        .route("/", get(pages::home))
        .route("/es/", get(pages::es_home))
        .route("/es", get(pages::es_home))
        .route("/categories/", get(pages::categories_hub))
        .route("/categories", get(pages::categories_hub))
        .route("/categories/:slug", get(pages::category_path))
        .route("/categories/:slug/", get(pages::category_path))
        .route("/categories/:slug/:page/", get(pages::category_path))
        .route("/es/categories/:slug/", get(pages::es_category_path))
        .route("/es/categories/:slug/:page/", get(pages::es_category_path))
        .route("/country/:slug/", get(pages::country_path))
        .route("/country/:slug/:page/", get(pages::country_path))
        .route("/es/country/:slug/", get(pages::es_country_path))
        .route("/es/country/:slug/:page/", get(pages::es_country_path))
        .route("/blog/", get(pages::blog_list))
        .route("/blog", get(pages::blog_list))
        .route("/es/blog/", get(pages::es_blog_list))
        .route("/blog/:slug/", get(pages::blog_post_path))
        .route("/blog/:slug", get(pages::blog_post_path))
        .route("/sitemap.xml", get(api::sitemap))
        .route("/health", get(api::health))
        .route("/:username", get(pages::root_segment));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .merge(clean_urls)
        .fallback_service(ServeDir::new(site_root))
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}
