//! 分析服务回复解析
//!
//! 回复是自由文本，从中提取第一个 `{` 到最后一个 `}` 之间的 JSON 对象

use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::AnalyzerError;
use crate::models::{AiAnswer, AiResponse, QuestionCatalog};
use crate::utils::logging::truncate_text;

/// 解析分析服务回复
///
/// # 参数
/// - `text`: 分析服务返回的原始文本
/// - `catalog`: 问题目录，用于过滤越界的键
///
/// # 返回
/// 返回按索引组织的答案；无法识别的条目会被丢弃，视为"没有建议"
pub fn parse_ai_response(text: &str, catalog: &QuestionCatalog) -> Result<AiResponse, AnalyzerError> {
    let re = Regex::new(r"(?s)\{.*\}").map_err(|e| AnalyzerError::MalformedResponse {
        detail: e.to_string(),
    })?;

    let json_text = re
        .find(text)
        .map(|m| m.as_str())
        .ok_or_else(|| AnalyzerError::MalformedResponse {
            detail: format!("回复中没有 JSON 对象: {}", truncate_text(text, 120)),
        })?;

    let value: JsonValue =
        serde_json::from_str(json_text).map_err(|e| AnalyzerError::MalformedResponse {
            detail: e.to_string(),
        })?;

    let JsonValue::Object(entries) = value else {
        return Err(AnalyzerError::MalformedResponse {
            detail: "回复中的 JSON 不是对象".to_string(),
        });
    };

    let mut response = AiResponse::new();
    for (key, entry) in entries {
        let index = match key.trim().parse::<usize>() {
            Ok(index) if catalog.contains(index) => index,
            _ => {
                warn!("忽略无法识别的问题键: {}", key);
                continue;
            }
        };

        match serde_json::from_value::<AiAnswer>(entry) {
            Ok(answer) => {
                if answer.suggestion().is_none() {
                    warn!("问题 {} 的答案无效: {:?}", index, answer.answer);
                }
                response.insert(index, answer);
            }
            Err(e) => warn!("问题 {} 的回答格式错误，已忽略: {}", index, e),
        }
    }

    debug!("解析得到 {}/{} 个答案", response.len(), catalog.len());

    Ok(response)
}
