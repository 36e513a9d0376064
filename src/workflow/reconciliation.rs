//! 答案核对 - 流程层
//!
//! 比较用户答案和分析服务答案，并处理分歧：
//!
//! ```text
//! (初始化) ──derive──▶ match
//!          └─derive──▶ mismatch ──confirm──▶ confirmed
//!                               └─change───▶ changed
//! ```
//!
//! `match` / `confirmed` / `changed` 不再有任何转换。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::ReconcileError;
use crate::models::{AiAnswer, Answer, QuestionCatalog, ValidationResult};

/// 单个问题的核对状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Match,
    Mismatch,
    Confirmed,
    Changed,
}

impl QuestionStatus {
    /// 状态转换表，非法转换返回 None
    pub fn apply(self, action: ResolveAction) -> Option<QuestionStatus> {
        match (self, action) {
            (QuestionStatus::Mismatch, ResolveAction::Confirm) => Some(QuestionStatus::Confirmed),
            (QuestionStatus::Mismatch, ResolveAction::Change) => Some(QuestionStatus::Changed),
            _ => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != QuestionStatus::Mismatch
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStatus::Match => "match",
            QuestionStatus::Mismatch => "mismatch",
            QuestionStatus::Confirmed => "confirmed",
            QuestionStatus::Changed => "changed",
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户对分歧问题的处理动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveAction {
    /// 保留自己的答案
    Confirm,
    /// 改为建议答案（无有效建议时取反）
    Change,
}

impl fmt::Display for ResolveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveAction::Confirm => f.write_str("confirm"),
            ResolveAction::Change => f.write_str("change"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionState {
    pub current_answer: Answer,
    pub status: QuestionStatus,
}

/// 最终答案集合
///
/// 只能由 [`Reconciliation::finalize`] 生成；从会话存储读回时用
/// [`FinalAnswerSet::is_complete`] 检查
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalAnswerSet(BTreeMap<usize, QuestionState>);

impl FinalAnswerSet {
    pub fn get(&self, index: usize) -> Option<&QuestionState> {
        self.0.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &QuestionState)> {
        self.0.iter().map(|(index, state)| (*index, state))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 覆盖目录中每个问题且没有未解决的分歧
    pub fn is_complete(&self, catalog: &QuestionCatalog) -> bool {
        catalog.indices().all(|index| {
            self.0
                .get(&index)
                .map(|state| state.status.is_resolved())
                .unwrap_or(false)
        })
    }
}

/// 一次会话的答案核对
#[derive(Debug, Clone)]
pub struct Reconciliation {
    result: ValidationResult,
    states: BTreeMap<usize, QuestionState>,
}

impl Reconciliation {
    /// 根据校验结果推导每个问题的初始状态
    ///
    /// 分析服务缺项或给出非法答案时视为不一致
    pub fn new(catalog: &QuestionCatalog, result: ValidationResult) -> Result<Self, ReconcileError> {
        let mut states = BTreeMap::new();

        for question in catalog.iter() {
            let user_answer = result
                .user_answers
                .get(question.index)
                .ok_or(ReconcileError::MissingUserAnswer(question.index))?;

            let status = if result.ai_answers.suggestion(question.index) == Some(user_answer) {
                QuestionStatus::Match
            } else {
                QuestionStatus::Mismatch
            };

            states.insert(
                question.index,
                QuestionState {
                    current_answer: user_answer,
                    status,
                },
            );
        }

        debug!(
            "核对初始化完成: {} 个问题, {} 个分歧",
            states.len(),
            states
                .values()
                .filter(|s| s.status == QuestionStatus::Mismatch)
                .count()
        );

        Ok(Self { result, states })
    }

    pub fn state(&self, index: usize) -> Option<&QuestionState> {
        self.states.get(&index)
    }

    pub fn states(&self) -> impl Iterator<Item = (usize, &QuestionState)> {
        self.states.iter().map(|(index, state)| (*index, state))
    }

    pub fn original_answer(&self, index: usize) -> Option<Answer> {
        self.result.user_answers.get(index)
    }

    pub fn ai_answer(&self, index: usize) -> Option<&AiAnswer> {
        self.result.ai_answers.get(index)
    }

    pub fn validation_result(&self) -> &ValidationResult {
        &self.result
    }

    /// 保留用户原答案
    pub fn confirm(&mut self, index: usize) -> Result<&QuestionState, ReconcileError> {
        self.transition(index, ResolveAction::Confirm)
    }

    /// 改为建议答案；没有有效建议时取反
    pub fn change(&mut self, index: usize) -> Result<&QuestionState, ReconcileError> {
        self.transition(index, ResolveAction::Change)
    }

    fn transition(
        &mut self,
        index: usize,
        action: ResolveAction,
    ) -> Result<&QuestionState, ReconcileError> {
        let suggestion = self.result.ai_answers.suggestion(index);
        let state = self
            .states
            .get_mut(&index)
            .ok_or(ReconcileError::UnknownQuestion(index))?;

        let next = state
            .status
            .apply(action)
            .ok_or(ReconcileError::IllegalTransition {
                index,
                from: state.status,
                action,
            })?;

        if action == ResolveAction::Change {
            state.current_answer = suggestion.unwrap_or(!state.current_answer);
        }
        state.status = next;

        debug!(
            "问题 {}: {} → {} (答案 {})",
            index, action, state.status, state.current_answer
        );

        Ok(state)
    }

    /// 仍处于 mismatch 的问题索引
    pub fn unresolved(&self) -> Vec<usize> {
        self.states
            .iter()
            .filter(|(_, state)| state.status == QuestionStatus::Mismatch)
            .map(|(index, _)| *index)
            .collect()
    }

    /// 提交闸门：每次都对完整状态重新计算
    pub fn can_submit(&self) -> bool {
        self.states.values().all(|state| state.status.is_resolved())
    }

    pub fn finalize(&self) -> Result<FinalAnswerSet, ReconcileError> {
        let unresolved = self.unresolved();
        if !unresolved.is_empty() {
            return Err(ReconcileError::Unresolved(unresolved));
        }
        Ok(FinalAnswerSet(self.states.clone()))
    }
}
