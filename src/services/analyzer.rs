//! 文档分析服务 - 业务能力层
//!
//! 只负责"把文档和问题交给分析服务"这一能力：
//! 上传 → 分析 → 解析 → 删除上传的文件
//!
//! 上传成功之后，不论分析成功、失败、超时还是解析失败，都会尝试删除文件；
//! 删除失败只记录日志

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clients::ApiFailure;
use crate::error::AnalyzerError;
use crate::models::{AiResponse, PdfDocument, QuestionCatalog};
use crate::services::response_parser::parse_ai_response;

/// 文档分析能力
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// 分析前的配置检查，默认总是可用
    fn ensure_configured(&self) -> Result<(), AnalyzerError> {
        Ok(())
    }

    async fn analyze(
        &self,
        document: &PdfDocument,
        catalog: &QuestionCatalog,
    ) -> Result<AiResponse, AnalyzerError>;
}

/// 分析服务的原始接口：文件上传、分析、删除
#[async_trait]
pub trait FileAnalysisApi: Send + Sync {
    async fn upload_file(&self, document: &PdfDocument) -> Result<String, ApiFailure>;
    async fn create_response(&self, file_id: &str, prompt: &str) -> Result<String, ApiFailure>;
    async fn delete_file(&self, file_id: &str) -> Result<(), ApiFailure>;
}

/// 删除上传文件的最长等待时间
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// 基于文件上传的文档分析
///
/// 上传和分析各自受 `timeout` 限制；删除最多等待 `timeout` 与 10 秒中较短者
///
/// `api` 为 None 表示没有配置凭证，调用时直接返回 `NotConfigured`
pub struct GatewayAnalyzer<C> {
    api: Option<C>,
    timeout: Duration,
}

impl<C: FileAnalysisApi> GatewayAnalyzer<C> {
    pub fn new(api: Option<C>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_some()
    }

    async fn analyze_uploaded(
        &self,
        api: &C,
        file_id: &str,
        catalog: &QuestionCatalog,
    ) -> Result<AiResponse, AnalyzerError> {
        let prompt = build_prompt(catalog);

        let text = match tokio::time::timeout(self.timeout, api.create_response(file_id, &prompt))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                error!("❌ 分析接口调用失败: {}", e);
                if e.is_quota_exceeded() {
                    return Err(AnalyzerError::QuotaExceeded);
                }
                return Err(AnalyzerError::AnalysisFailed(message_or(
                    &e,
                    "Failed to analyze PDF. Please try again.",
                )));
            }
            Err(_) => {
                error!("❌ 分析接口超时 ({} 秒)", self.timeout.as_secs());
                return Err(AnalyzerError::AnalysisFailed(format!(
                    "Analysis timed out after {} seconds. Please try again.",
                    self.timeout.as_secs()
                )));
            }
        };

        debug!("分析回复长度: {} 字符", text.len());

        parse_ai_response(&text, catalog).map_err(|e| {
            if let AnalyzerError::MalformedResponse { detail } = &e {
                error!("❌ 无法解析分析回复: {}", detail);
            }
            e
        })
    }

    /// 尝试删除上传的文件，失败或超时只记录日志
    async fn release(&self, api: &C, file_id: &str) {
        let limit = self.timeout.min(CLEANUP_TIMEOUT);
        match tokio::time::timeout(limit, api.delete_file(file_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("⚠️ 删除上传的文件 {} 失败: {}", file_id, e),
            Err(_) => warn!(
                "⚠️ 删除上传的文件 {} 超时 ({} 毫秒)，已放弃",
                file_id,
                limit.as_millis()
            ),
        }
    }
}

#[async_trait]
impl<C: FileAnalysisApi> DocumentAnalyzer for GatewayAnalyzer<C> {
    fn ensure_configured(&self) -> Result<(), AnalyzerError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AnalyzerError::NotConfigured)
        }
    }

    async fn analyze(
        &self,
        document: &PdfDocument,
        catalog: &QuestionCatalog,
    ) -> Result<AiResponse, AnalyzerError> {
        let api = self.api.as_ref().ok_or_else(|| {
            error!("❌ 未配置分析服务凭证");
            AnalyzerError::NotConfigured
        })?;

        info!("📤 正在上传文档 {}...", document.filename());
        let file_id = match tokio::time::timeout(self.timeout, api.upload_file(document)).await {
            Ok(Ok(file_id)) => file_id,
            Ok(Err(e)) => {
                error!("❌ 文档上传失败: {}", e);
                if e.is_quota_exceeded() {
                    return Err(AnalyzerError::QuotaExceeded);
                }
                return Err(AnalyzerError::UploadFailed(message_or(
                    &e,
                    "Failed to upload file. Please try again.",
                )));
            }
            Err(_) => {
                error!("❌ 文档上传超时 ({} 秒)", self.timeout.as_secs());
                return Err(AnalyzerError::UploadFailed(format!(
                    "Upload timed out after {} seconds. Please try again.",
                    self.timeout.as_secs()
                )));
            }
        };

        info!("🔍 正在分析文档 ({} 个问题)...", catalog.len());
        let outcome = self.analyze_uploaded(api, &file_id, catalog).await;
        self.release(api, &file_id).await;

        if let Ok(response) = &outcome {
            info!("✓ 分析完成，得到 {}/{} 个答案", response.len(), catalog.len());
        }
        outcome
    }
}

fn message_or(failure: &ApiFailure, fallback: &str) -> String {
    if failure.message.trim().is_empty() {
        fallback.to_string()
    } else {
        failure.message.clone()
    }
}

/// 构建分析提示词
pub fn build_prompt(catalog: &QuestionCatalog) -> String {
    let questions = catalog
        .iter()
        .map(|q| format!("{}. {}", q.index, q.text))
        .collect::<Vec<_>>()
        .join("\n");
    let last_index = catalog.len().saturating_sub(1);

    format!(
        r#"I want you to read through the attached architectural plan, and provide me yes or no answers to the following questions. For each answer, provide a detailed reasoning (300-500 characters) that includes specific references to the plan and technical details supporting your answer.

Questions:
{}

Please respond ONLY with valid JSON in the following format (use question numbers as keys):
{{
  "0": {{"answer": "yes", "reasoning": "detailed explanation with specific references"}},
  "1": {{"answer": "no", "reasoning": "detailed explanation with specific references"}}
}}

IMPORTANT:
- Use numbers 0-{} as keys, matching the question numbers above
- Answer strictly "yes" or "no" in lowercase
- Each reasoning should be 300-500 characters long
- Include specific details from the plan to support your answer"#,
        questions, last_index
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Answer;
    use std::sync::Mutex;

    /// 可编排结果的假接口，记录删除调用
    #[derive(Default)]
    struct FakeApi {
        upload: Option<ApiFailure>,
        reply: Option<Result<String, ApiFailure>>,
        reply_delay: Option<Duration>,
        upload_hangs: bool,
        delete_fails: bool,
        delete_hangs: bool,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FileAnalysisApi for FakeApi {
        async fn upload_file(&self, _document: &PdfDocument) -> Result<String, ApiFailure> {
            if self.upload_hangs {
                std::future::pending::<()>().await;
            }
            match &self.upload {
                Some(failure) => Err(failure.clone()),
                None => Ok("file-abc123".to_string()),
            }
        }

        async fn create_response(&self, _file_id: &str, _prompt: &str) -> Result<String, ApiFailure> {
            if let Some(delay) = self.reply_delay {
                tokio::time::sleep(delay).await;
            }
            self.reply
                .clone()
                .unwrap_or_else(|| Ok(r#"{"0": {"answer": "yes", "reasoning": "ok"}}"#.to_string()))
        }

        async fn delete_file(&self, file_id: &str) -> Result<(), ApiFailure> {
            self.deleted.lock().unwrap().push(file_id.to_string());
            if self.delete_hangs {
                std::future::pending::<()>().await;
            }
            if self.delete_fails {
                Err(ApiFailure::new(Some(500), None, "delete failed"))
            } else {
                Ok(())
            }
        }
    }

    fn document() -> PdfDocument {
        PdfDocument::new("plan.pdf", Some("application/pdf"), b"%PDF-1.7 plan".to_vec()).unwrap()
    }

    fn analyzer(api: FakeApi) -> GatewayAnalyzer<FakeApi> {
        GatewayAnalyzer::new(Some(api), Duration::from_secs(5))
    }

    fn deleted(analyzer: &GatewayAnalyzer<FakeApi>) -> Vec<String> {
        analyzer.api.as_ref().unwrap().deleted.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_success_releases_artifact() {
        let analyzer = analyzer(FakeApi::default());
        let response = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap();
        assert_eq!(response.suggestion(0), Some(Answer::Yes));
        assert_eq!(deleted(&analyzer), vec!["file-abc123"]);
    }

    #[tokio::test]
    async fn test_not_configured_fails_fast() {
        let analyzer: GatewayAnalyzer<FakeApi> = GatewayAnalyzer::new(None, Duration::from_secs(5));
        assert!(!analyzer.is_configured());
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert_eq!(err, AnalyzerError::NotConfigured);
    }

    #[tokio::test]
    async fn test_upload_quota_error_releases_nothing() {
        let analyzer = analyzer(FakeApi {
            upload: Some(ApiFailure::new(Some(429), None, "Rate limit")),
            ..Default::default()
        });
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert_eq!(err, AnalyzerError::QuotaExceeded);
        assert!(deleted(&analyzer).is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_uses_fallback_message() {
        let analyzer = analyzer(FakeApi {
            upload: Some(ApiFailure::new(Some(500), None, "")),
            ..Default::default()
        });
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalyzerError::UploadFailed("Failed to upload file. Please try again.".into())
        );
    }

    #[tokio::test]
    async fn test_quota_during_analysis_releases_artifact() {
        let analyzer = analyzer(FakeApi {
            reply: Some(Err(ApiFailure::new(
                Some(400),
                Some("insufficient_quota".into()),
                "You exceeded your current quota",
            ))),
            ..Default::default()
        });
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert_eq!(err, AnalyzerError::QuotaExceeded);
        assert_eq!(deleted(&analyzer), vec!["file-abc123"]);
    }

    #[tokio::test]
    async fn test_analysis_failure_releases_artifact() {
        let analyzer = analyzer(FakeApi {
            reply: Some(Err(ApiFailure::new(Some(502), None, "Bad gateway"))),
            ..Default::default()
        });
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert_eq!(err, AnalyzerError::AnalysisFailed("Bad gateway".into()));
        assert_eq!(deleted(&analyzer).len(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_releases_artifact() {
        let analyzer = analyzer(FakeApi {
            reply: Some(Ok("Sorry, I can't help with that.".to_string())),
            ..Default::default()
        });
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedResponse { .. }));
        assert_eq!(deleted(&analyzer).len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_analysis_failure_and_releases_artifact() {
        let analyzer = GatewayAnalyzer::new(
            Some(FakeApi {
                reply_delay: Some(Duration::from_secs(2)),
                ..Default::default()
            }),
            Duration::from_millis(20),
        );
        let err = analyzer
            .analyze(&document(), &QuestionCatalog::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::AnalysisFailed(_)));
        assert_eq!(deleted(&analyzer).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        let analyzer = analyzer(FakeApi {
            delete_fails: true,
            ..Default::default()
        });
        let result = analyzer.analyze(&document(), &QuestionCatalog::default()).await;
        assert!(result.is_ok());
        assert_eq!(deleted(&analyzer).len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_upload_times_out_as_upload_failure() {
        let analyzer = GatewayAnalyzer::new(
            Some(FakeApi {
                upload_hangs: true,
                ..Default::default()
            }),
            Duration::from_millis(50),
        );
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            analyzer.analyze(&document(), &QuestionCatalog::default()),
        )
        .await
        .expect("upload must be bounded by the analyzer timeout");

        assert!(matches!(outcome, Err(AnalyzerError::UploadFailed(_))));
        assert!(deleted(&analyzer).is_empty());
    }

    #[tokio::test]
    async fn test_stalled_delete_does_not_hold_back_result() {
        let analyzer = GatewayAnalyzer::new(
            Some(FakeApi {
                delete_hangs: true,
                ..Default::default()
            }),
            Duration::from_millis(50),
        );
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            analyzer.analyze(&document(), &QuestionCatalog::default()),
        )
        .await
        .expect("cleanup must be bounded");

        assert_eq!(outcome.unwrap().suggestion(0), Some(Answer::Yes));
        assert_eq!(deleted(&analyzer), vec!["file-abc123"]);
    }

    #[test]
    fn test_configuration_check() {
        let configured = analyzer(FakeApi::default());
        assert!(configured.ensure_configured().is_ok());

        let missing: GatewayAnalyzer<FakeApi> = GatewayAnalyzer::new(None, Duration::from_secs(5));
        assert_eq!(missing.ensure_configured(), Err(AnalyzerError::NotConfigured));
    }

    #[test]
    fn test_prompt_lists_every_question_and_key_range() {
        let prompt = build_prompt(&QuestionCatalog::default());
        assert!(prompt.contains("0. Are there structural changes?"));
        assert!(prompt.contains("7. Does the work does not involve adding any new heated space?"));
        assert!(prompt.contains("Use numbers 0-7 as keys"));
        assert!(prompt.contains("300-500 characters"));
    }
}
