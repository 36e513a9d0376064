//! 校验服务 - 业务能力层
//!
//! 把用户答案和文档组合成一次校验：检查输入 → 调用文档分析 → 生成 ValidationResult

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AnalyzerError;
use crate::models::{PdfDocument, QuestionCatalog, UserAnswers, ValidationResult};
use crate::services::analyzer::DocumentAnalyzer;

/// 一次提交的校验能力
///
/// 服务端直接调用文档分析，客户端通过 HTTP 调用服务端
#[async_trait]
pub trait ValidationService: Send + Sync {
    /// 在读取答案之前检查服务是否可用
    fn ensure_configured(&self) -> Result<(), AnalyzerError> {
        Ok(())
    }

    async fn validate(
        &self,
        answers: &UserAnswers,
        document: &PdfDocument,
    ) -> Result<ValidationResult, AnalyzerError>;
}

#[async_trait]
impl<T: ValidationService + ?Sized> ValidationService for Arc<T> {
    fn ensure_configured(&self) -> Result<(), AnalyzerError> {
        (**self).ensure_configured()
    }

    async fn validate(
        &self,
        answers: &UserAnswers,
        document: &PdfDocument,
    ) -> Result<ValidationResult, AnalyzerError> {
        (**self).validate(answers, document).await
    }
}

/// 直接调用文档分析的校验服务
pub struct DocumentValidation<A> {
    catalog: QuestionCatalog,
    analyzer: A,
}

impl<A: DocumentAnalyzer> DocumentValidation<A> {
    pub fn new(catalog: QuestionCatalog, analyzer: A) -> Self {
        Self { catalog, analyzer }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }
}

#[async_trait]
impl<A: DocumentAnalyzer> ValidationService for DocumentValidation<A> {
    fn ensure_configured(&self) -> Result<(), AnalyzerError> {
        self.analyzer.ensure_configured()
    }

    async fn validate(
        &self,
        answers: &UserAnswers,
        document: &PdfDocument,
    ) -> Result<ValidationResult, AnalyzerError> {
        let missing = answers.missing(&self.catalog);
        if !missing.is_empty() {
            warn!("⚠️ 答案不完整，缺少问题: {:?}", missing);
            return Err(AnalyzerError::InvalidInput(format!(
                "Please answer all questions (missing: {})",
                missing
                    .iter()
                    .map(|i| (i + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let ai_answers = self.analyzer.analyze(document, &self.catalog).await?;

        info!(
            "✓ 校验完成: {} 个用户答案, {} 个分析答案",
            answers.len(),
            ai_answers.len()
        );

        Ok(ValidationResult {
            user_answers: answers.clone(),
            ai_answers,
        })
    }
}
