/// 校验接口客户端
///
/// 把用户答案和 PDF 以 multipart 表单提交到 `/api/validate`
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::AnalyzerError;
use crate::models::{ErrorBody, PdfDocument, UserAnswers, ValidationResult, PDF_CONTENT_TYPE};
use crate::services::ValidationService;

pub struct ValidateClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ValidateClient {
    /// `timeout` 覆盖整个请求，包括服务端的上传、分析和清理
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/validate", server_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ValidationService for ValidateClient {
    async fn validate(
        &self,
        answers: &UserAnswers,
        document: &PdfDocument,
    ) -> Result<ValidationResult, AnalyzerError> {
        let answers_json = serde_json::to_string(answers)
            .map_err(|e| AnalyzerError::InvalidInput(e.to_string()))?;

        let pdf = Part::bytes(document.bytes().to_vec())
            .file_name(document.filename().to_string())
            .mime_str(PDF_CONTENT_TYPE)
            .map_err(|e| AnalyzerError::InvalidInput(e.to_string()))?;
        let form = Form::new()
            .part("pdf", pdf)
            .text("userAnswers", answers_json);

        debug!("提交到 {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("❌ 无法连接校验接口: {}", e);
                if e.is_timeout() {
                    AnalyzerError::AnalysisFailed(
                        "Validation timed out. Please try again.".to_string(),
                    )
                } else {
                    AnalyzerError::AnalysisFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AnalyzerError::AnalysisFailed(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| AnalyzerError::MalformedResponse {
                detail: e.to_string(),
            });
        }

        let error_body = serde_json::from_slice::<ErrorBody>(&body).unwrap_or_else(|_| ErrorBody {
            error: "Failed to validate answers".to_string(),
            error_type: None,
        });
        error!("❌ 校验接口返回 {}: {}", status, error_body.error);

        Err(AnalyzerError::from_body(status.as_u16(), error_body))
    }
}
