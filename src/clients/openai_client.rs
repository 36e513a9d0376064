/// 文档分析 API 客户端
///
/// 基于 `async-openai` 封装文件上传、分析请求和文件删除，
/// 兼容 OpenAI API 的服务都可以通过 `OPENAI_API_BASE_URL` 接入
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::files::{CreateFileRequestArgs, FileInput, FilePurpose},
    types::responses::CreateResponse,
    Client,
};
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::PdfDocument;
use crate::services::analyzer::FileAnalysisApi;

/// 分析 API 调用失败
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiFailure {
    /// HTTP 状态码，未知时为 None
    pub status: Option<u16>,
    /// 接口返回的错误码，例如 `insufficient_quota`
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: Option<u16>, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        self.status == Some(429) || self.code.as_deref() == Some("insufficient_quota")
    }
}

impl From<OpenAIError> for ApiFailure {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::ApiError(api) => {
                let code = api.code.or(api.r#type);
                let status = match code.as_deref() {
                    Some("insufficient_quota") | Some("rate_limit_exceeded") => Some(429),
                    _ => None,
                };
                Self::new(status, code, api.message)
            }
            OpenAIError::Reqwest(e) => {
                Self::new(e.status().map(|s| s.as_u16()), None, e.to_string())
            }
            other => Self::new(None, None, other.to_string()),
        }
    }
}

/// 分析 API 客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiClient {
    /// 创建客户端
    ///
    /// `http` 决定单次请求的超时等传输设置
    pub fn new(
        api_key: &str,
        api_base_url: &str,
        model_name: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base_url.trim_end_matches('/'));

        Self {
            client: Client::with_config(openai_config).with_http_client(http),
            model_name: model_name.into(),
        }
    }

    /// 没有配置凭证时返回 Ok(None)
    pub fn from_config(config: &Config) -> Result<Option<Self>, reqwest::Error> {
        let Some(api_key) = config.openai_api_key.as_deref() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(config.analyzer_timeout())
            .build()?;

        Ok(Some(Self::new(
            api_key,
            &config.openai_api_base_url,
            config.openai_model_name.clone(),
            http,
        )))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 构造分析请求：先附上文件，再给出提示词
    fn build_request(&self, file_id: &str, prompt: &str) -> Result<CreateResponse, ApiFailure> {
        serde_json::from_value(json!({
            "model": self.model_name,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_file", "file_id": file_id },
                    { "type": "input_text", "text": prompt },
                ],
            }],
        }))
        .map_err(|e| ApiFailure::new(None, None, format!("无法构造分析请求: {}", e)))
    }
}

#[async_trait]
impl FileAnalysisApi for OpenAiClient {
    async fn upload_file(&self, document: &PdfDocument) -> Result<String, ApiFailure> {
        debug!("上传文档: {} ({} 字节)", document.filename(), document.len());

        let request = CreateFileRequestArgs::default()
            .file(FileInput::from_vec_u8(
                document.filename().to_string(),
                document.bytes().to_vec(),
            ))
            .purpose(FilePurpose::UserData)
            .build()?;

        let file = self.client.files().create(request).await?;

        debug!("文档上传成功: {}", file.id);
        Ok(file.id)
    }

    async fn create_response(&self, file_id: &str, prompt: &str) -> Result<String, ApiFailure> {
        debug!("调用分析接口，模型: {}", self.model_name);

        let request = self.build_request(file_id, prompt)?;
        let response = self.client.responses().create(request).await?;

        Ok(response.output_text().unwrap_or_default())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiFailure> {
        self.client.files().delete(file_id).await?;
        debug!("已删除上传的文档: {}", file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(code: Option<&str>, kind: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: "You exceeded your current quota".to_string(),
            r#type: kind.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_quota_detection() {
        assert!(ApiFailure::new(Some(429), None, "slow down").is_quota_exceeded());
        assert!(
            ApiFailure::new(Some(400), Some("insufficient_quota".into()), "")
                .is_quota_exceeded()
        );
        assert!(!ApiFailure::new(Some(500), None, "boom").is_quota_exceeded());
    }

    #[test]
    fn test_api_errors_map_to_quota_failures() {
        let by_code = ApiFailure::from(api_error(Some("insufficient_quota"), None));
        assert!(by_code.is_quota_exceeded());
        assert_eq!(by_code.message, "You exceeded your current quota");

        let by_type = ApiFailure::from(api_error(None, Some("insufficient_quota")));
        assert!(by_type.is_quota_exceeded());

        let rate_limited = ApiFailure::from(api_error(Some("rate_limit_exceeded"), None));
        assert_eq!(rate_limited.status, Some(429));

        let other = ApiFailure::from(api_error(Some("invalid_request_error"), None));
        assert!(!other.is_quota_exceeded());
    }

    #[test]
    fn test_request_attaches_file_before_prompt() {
        let client = OpenAiClient::new("sk-test", "http://localhost:9000/v1/", "gpt-4o", reqwest::Client::new());
        let request = client.build_request("file-abc123", "read the plan").unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "gpt-4o");
        let content = &value["input"][0]["content"];
        assert_eq!(content[0]["type"], "input_file");
        assert_eq!(content[0]["file_id"], "file-abc123");
        assert_eq!(content[1]["text"], "read the plan");
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = Config::default();
        config.openai_api_key = None;
        assert!(OpenAiClient::from_config(&config).unwrap().is_none());

        config.openai_api_key = Some("sk-test".into());
        config.openai_model_name = "gpt-4.1".into();
        let client = OpenAiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.model_name(), "gpt-4.1");
    }
}
