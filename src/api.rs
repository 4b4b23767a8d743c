mod categories;
mod comments;
mod extract;
mod posts;
mod reading_lists;
mod response;
mod users;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{error::Result, state::AppState};

pub use self::{
    extract::{JsonBody, PathParam, QueryParams},
    response::ApiResponse,
};

/// 构建完整路由，所有接口挂载在 `/api` 下
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(posts::setup_route())
        .merge(comments::setup_route())
        .merge(categories::setup_route())
        .merge(users::setup_route())
        .merge(reading_lists::setup_route());

    let router = Router::new().nest("/api", api).with_state(state);
    add_middlewares(router)
}

/// 启动 HTTP 服务
pub async fn run_server(state: AppState, bind_addr: &str) -> Result<()> {
    let router = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = bind_addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, ?latency, "request failed");
    }

    router.layer(
        TraceLayer::new_for_http()
            .on_failure(log_failure)
            .on_request(|_req: &_, _span: &tracing::Span| {}),
    )
}
