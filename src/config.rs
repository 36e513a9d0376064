/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 服务监听地址
    pub listen_addr: String,
    /// 客户端访问的服务地址
    pub server_url: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 自定义问题目录文件（TOML），为空时使用内置目录
    pub questions_file: Option<String>,
    // --- 文档分析服务配置 ---
    /// 分析服务凭证，缺失时校验接口直接返回 "not configured"
    pub openai_api_key: Option<String>,
    pub openai_api_base_url: String,
    pub openai_model_name: String,
    /// 单次分析的超时时间（秒）
    pub analyzer_timeout_secs: u64,
    /// 上传请求体大小上限（字节）
    pub max_upload_bytes: u64,
    /// 客户端等待校验接口的超时时间（秒）
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            server_url: "http://127.0.0.1:3000".to_string(),
            verbose_logging: false,
            questions_file: None,
            openai_api_key: None,
            openai_api_base_url: "https://api.openai.com/v1".to_string(),
            openai_model_name: "gpt-4o".to_string(),
            analyzer_timeout_secs: 60,
            max_upload_bytes: 20 * 1024 * 1024,
            http_timeout_secs: 180,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(default.listen_addr),
            server_url: std::env::var("SERVER_URL").unwrap_or(default.server_url),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            questions_file: non_empty_var("QUESTIONS_FILE"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_api_base_url: std::env::var("OPENAI_API_BASE_URL").unwrap_or(default.openai_api_base_url),
            openai_model_name: std::env::var("OPENAI_MODEL_NAME").unwrap_or(default.openai_model_name),
            analyzer_timeout_secs: std::env::var("ANALYZER_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.analyzer_timeout_secs),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_upload_bytes),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.http_timeout_secs),
        }
    }

    pub fn analyzer_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.analyzer_timeout_secs)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
