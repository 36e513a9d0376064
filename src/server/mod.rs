//! HTTP 接口层
//!
//! - `POST /api/validate`：multipart 表单（`pdf` + `userAnswers`）
//! - `GET /healthz`：存活检查
//!
//! 所有错误都以 `{ error, errorType? }` JSON 返回

pub mod validate;

use anyhow::{Context, Result};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::models::ErrorBody;
use crate::services::ValidationService;

/// 接口共享状态
#[derive(Clone)]
pub struct AppState {
    pub validation: Arc<dyn ValidationService>,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(validation: Arc<dyn ValidationService>, max_upload_bytes: u64) -> Self {
        Self {
            validation,
            max_upload_bytes,
        }
    }
}

/// 组装所有路由
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "ok");

    let validate = warp::path!("api" / "validate")
        .and(warp::post())
        .and(warp::multipart::form().max_length(state.max_upload_bytes))
        .and(with_state(state))
        .and_then(validate::handle_validate);

    health
        .or(validate)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// 启动服务，Ctrl-C 时优雅退出
pub async fn serve(listen_addr: &str, state: AppState) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("无效的监听地址: {}", listen_addr))?;

    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("⚠️ 无法监听退出信号: {}", e);
            }
        })
        .with_context(|| format!("无法绑定地址: {}", addr))?;

    info!("🌐 校验服务已启动: http://{}", bound);
    server.await;
    info!("服务已停止");

    Ok(())
}

pub(crate) fn json_error(status: StatusCode, body: &ErrorBody) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// 把 warp 的拒绝转换为 JSON 错误
async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Uploaded file is too large")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        warn!("⚠️ 无效请求: {:?}", err);
        (StatusCode::BAD_REQUEST, "Invalid request: expected a multipart form")
    };

    Ok(json_error(
        status,
        &ErrorBody {
            error: message.to_string(),
            error_type: None,
        },
    ))
}
