use thiserror::Error;

use crate::models::ErrorBody;
use crate::workflow::reconciliation::{QuestionStatus, ResolveAction};
use crate::workflow::Stage;

/// 文档分析错误
///
/// 边界层统一使用的错误分类，直接决定接口的状态码和 `errorType`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    /// 缺少文档或答案、文档不是 PDF
    #[error("{0}")]
    InvalidInput(String),

    /// 未配置分析服务凭证
    #[error("Service not properly configured. Please contact support.")]
    NotConfigured,

    /// 分析服务配额耗尽
    #[error("Service quota exceeded. Please try again later or contact support.")]
    QuotaExceeded,

    /// 上传文档失败
    #[error("{0}")]
    UploadFailed(String),

    /// 分析调用失败（含超时）
    #[error("{0}")]
    AnalysisFailed(String),

    /// 分析服务返回的内容无法解析
    #[error("Failed to parse AI response. Please try again.")]
    MalformedResponse { detail: String },
}

impl AnalyzerError {
    pub fn status_code(&self) -> u16 {
        match self {
            AnalyzerError::InvalidInput(_) => 400,
            AnalyzerError::QuotaExceeded => 429,
            AnalyzerError::NotConfigured
            | AnalyzerError::UploadFailed(_)
            | AnalyzerError::AnalysisFailed(_)
            | AnalyzerError::MalformedResponse { .. } => 500,
        }
    }

    pub fn error_type(&self) -> Option<&'static str> {
        match self {
            AnalyzerError::QuotaExceeded => Some("quota_exceeded"),
            AnalyzerError::UploadFailed(_) => Some("upload_error"),
            AnalyzerError::AnalysisFailed(_) => Some("api_error"),
            AnalyzerError::MalformedResponse { .. } => Some("parse_error"),
            AnalyzerError::InvalidInput(_) | AnalyzerError::NotConfigured => None,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, AnalyzerError::QuotaExceeded)
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            error_type: self.error_type().map(str::to_string),
        }
    }

    /// 从接口错误响应还原错误分类
    pub fn from_body(status: u16, body: ErrorBody) -> Self {
        match body.error_type.as_deref() {
            Some("quota_exceeded") => AnalyzerError::QuotaExceeded,
            Some("upload_error") => AnalyzerError::UploadFailed(body.error),
            Some("api_error") => AnalyzerError::AnalysisFailed(body.error),
            Some("parse_error") => AnalyzerError::MalformedResponse { detail: body.error },
            _ if status == 429 => AnalyzerError::QuotaExceeded,
            _ if (400..500).contains(&status) => AnalyzerError::InvalidInput(body.error),
            _ => AnalyzerError::AnalysisFailed(body.error),
        }
    }
}

/// 答案核对错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("问题 {0} 不在目录中")]
    UnknownQuestion(usize),

    #[error("问题 {0} 缺少用户答案")]
    MissingUserAnswer(usize),

    #[error("问题 {index} 处于 {from} 状态，不能执行 {action}")]
    IllegalTransition {
        index: usize,
        from: QuestionStatus,
        action: ResolveAction,
    },

    #[error("仍有未解决的分歧: {0:?}")]
    Unresolved(Vec<usize>),
}

/// 提交流程错误
#[derive(Debug, Error)]
pub enum FlowError {
    /// 缺少前一阶段的数据，应回到填写阶段
    #[error("缺少进入 {0} 阶段所需的数据")]
    MissingPrecondition(Stage),

    #[error("已有提交正在处理中")]
    SubmissionInFlight,

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("会话数据序列化失败: {0}")]
    Storage(#[from] serde_json::Error),
}

impl FlowError {
    /// 是否应该重定向到第一阶段而不是弹出错误
    pub fn is_redirect(&self) -> bool {
        matches!(self, FlowError::MissingPrecondition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_and_error_types() {
        let cases = [
            (AnalyzerError::InvalidInput("x".into()), 400, None),
            (AnalyzerError::NotConfigured, 500, None),
            (AnalyzerError::QuotaExceeded, 429, Some("quota_exceeded")),
            (AnalyzerError::UploadFailed("x".into()), 500, Some("upload_error")),
            (AnalyzerError::AnalysisFailed("x".into()), 500, Some("api_error")),
            (
                AnalyzerError::MalformedResponse { detail: "x".into() },
                500,
                Some("parse_error"),
            ),
        ];
        for (err, status, error_type) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err);
            assert_eq!(err.error_type(), error_type, "{:?}", err);
        }
    }

    #[test]
    fn test_body_round_trips_through_classification() {
        let original = AnalyzerError::UploadFailed("disk full".into());
        let restored = AnalyzerError::from_body(500, original.to_body());
        assert_eq!(restored, original);

        let quota = AnalyzerError::from_body(429, AnalyzerError::QuotaExceeded.to_body());
        assert!(quota.is_quota_exceeded());
    }

    #[test]
    fn test_untyped_bodies_fall_back_on_status() {
        let body = ErrorBody {
            error: "No PDF file provided".into(),
            error_type: None,
        };
        assert_eq!(
            AnalyzerError::from_body(400, body.clone()),
            AnalyzerError::InvalidInput("No PDF file provided".into())
        );
        assert!(matches!(
            AnalyzerError::from_body(500, body),
            AnalyzerError::AnalysisFailed(_)
        ));
    }

    #[test]
    fn test_malformed_response_hides_detail_from_users() {
        let err = AnalyzerError::MalformedResponse {
            detail: "expected value at line 1".into(),
        };
        assert_eq!(err.to_string(), "Failed to parse AI response. Please try again.");
    }
}
