//! 用户答案 / 分析服务答案 / 校验结果

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::question::{Answer, QuestionCatalog};

/// 用户答案：索引 → 是/否
///
/// JSON 中的键是十进制索引字符串（`{"0":"yes"}`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAnswers(BTreeMap<usize, Answer>);

impl UserAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, answer: Answer) {
        self.0.insert(index, answer);
    }

    pub fn get(&self, index: usize) -> Option<Answer> {
        self.0.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 返回目录中尚未作答的索引
    pub fn missing(&self, catalog: &QuestionCatalog) -> Vec<usize> {
        catalog
            .indices()
            .filter(|index| !self.0.contains_key(index))
            .collect()
    }

    pub fn is_complete(&self, catalog: &QuestionCatalog) -> bool {
        self.missing(catalog).is_empty()
    }
}

impl FromIterator<(usize, Answer)> for UserAnswers {
    fn from_iter<T: IntoIterator<Item = (usize, Answer)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 分析服务对单个问题的回答
///
/// `answer` 保留原始字符串，只有严格的 "yes"/"no" 才算有效建议
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub reasoning: String,
}

impl AiAnswer {
    pub fn new(answer: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            reasoning: reasoning.into(),
        }
    }

    pub fn suggestion(&self) -> Option<Answer> {
        self.answer.parse().ok()
    }
}

/// 分析服务的完整回答：索引 → AiAnswer，可能缺项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AiResponse(BTreeMap<usize, AiAnswer>);

impl AiResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, answer: AiAnswer) {
        self.0.insert(index, answer);
    }

    pub fn get(&self, index: usize) -> Option<&AiAnswer> {
        self.0.get(&index)
    }

    /// 缺项或非法答案都返回 None
    pub fn suggestion(&self, index: usize) -> Option<Answer> {
        self.get(index).and_then(AiAnswer::suggestion)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(usize, AiAnswer)> for AiResponse {
    fn from_iter<T: IntoIterator<Item = (usize, AiAnswer)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 一次提交的校验结果快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub user_answers: UserAnswers,
    pub ai_answers: AiResponse,
}

/// 接口错误响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}
