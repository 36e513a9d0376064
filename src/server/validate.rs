//! `POST /api/validate` 处理
//!
//! 解析 multipart 表单 → 调用校验服务 → 返回 `{ userAnswers, aiAnswers }`

use bytes::BufMut;
use futures::TryStreamExt;
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::{Rejection, Reply};

use crate::error::AnalyzerError;
use crate::models::{PdfDocument, UserAnswers, ValidationResult};
use crate::server::{json_error, AppState};

/// 表单中识别的字段
#[derive(Default)]
struct SubmittedForm {
    pdf: Option<PdfDocument>,
    user_answers: Option<String>,
}

pub async fn handle_validate(
    form: FormData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let response = match validate(form, &state).await {
        Ok(result) => {
            warp::reply::with_status(warp::reply::json(&result), StatusCode::OK).into_response()
        }
        Err(err) => {
            error!("❌ 校验请求失败 ({}): {}", err.status_code(), err);
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            json_error(status, &err.to_body())
        }
    };
    Ok(response)
}

async fn validate(form: FormData, state: &AppState) -> Result<ValidationResult, AnalyzerError> {
    let submitted = read_form(form).await?;

    let document = submitted
        .pdf
        .ok_or_else(|| AnalyzerError::InvalidInput("No PDF file provided".to_string()))?;
    state.validation.ensure_configured()?;
    let raw_answers = submitted
        .user_answers
        .ok_or_else(|| AnalyzerError::InvalidInput("No answers provided".to_string()))?;
    let answers: UserAnswers = serde_json::from_str(&raw_answers).map_err(|e| {
        debug!("userAnswers 解析失败: {}", e);
        AnalyzerError::InvalidInput("Invalid answers payload".to_string())
    })?;

    info!(
        "📥 收到校验请求: {} ({} 字节), {} 个答案",
        document.filename(),
        document.len(),
        answers.len()
    );

    // 在独立任务中执行：客户端断开后分析仍会完成并清理上传的文件
    let service = state.validation.clone();
    tokio::spawn(async move { service.validate(&answers, &document).await })
        .await
        .map_err(|e| {
            error!("❌ 校验任务异常退出: {}", e);
            AnalyzerError::AnalysisFailed("Internal server error".to_string())
        })?
}

async fn read_form(form: FormData) -> Result<SubmittedForm, AnalyzerError> {
    let parts: Vec<Part> = form
        .try_collect()
        .await
        .map_err(|e| AnalyzerError::InvalidInput(format!("Failed to read form data: {}", e)))?;

    let mut submitted = SubmittedForm::default();
    for part in parts {
        let name = part.name().to_string();
        match name.as_str() {
            "pdf" => {
                if submitted.pdf.is_some() {
                    return Err(AnalyzerError::InvalidInput(
                        "Only one PDF file may be uploaded".to_string(),
                    ));
                }
                let filename = part.filename().unwrap_or_default().to_string();
                let content_type = part.content_type().map(str::to_string);
                let bytes = read_part(part).await?;
                submitted.pdf = Some(PdfDocument::new(filename, content_type.as_deref(), bytes)?);
            }
            "userAnswers" if submitted.user_answers.is_some() => {
                debug!("忽略重复的 userAnswers 字段");
            }
            "userAnswers" => {
                let bytes = read_part(part).await?;
                let text = String::from_utf8(bytes).map_err(|_| {
                    AnalyzerError::InvalidInput("Invalid answers payload".to_string())
                })?;
                submitted.user_answers = Some(text);
            }
            other => debug!("忽略未知表单字段: {}", other),
        }
    }

    Ok(submitted)
}

async fn read_part(part: Part) -> Result<Vec<u8>, AnalyzerError> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, data| {
            acc.put(data);
            async move { Ok(acc) }
        })
        .await
        .map_err(|e| AnalyzerError::InvalidInput(format!("Failed to read form data: {}", e)))
}
