//! 问题目录
//!
//! 固定顺序的是/否问题列表，按 0 起始的索引寻址

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;
use std::str::FromStr;

/// 内置问题列表
pub const DEFAULT_QUESTIONS: [&str; 8] = [
    "Are there structural changes?",
    "Does this permit includes the work for an ADU?",
    "Does the Work involves creating a second kitchen?",
    "Does the Work includes relocation or alteration of a bearing wall?",
    "Is there Relocation or addition of a structural beam, column, or footing?",
    "Is there an an increase in structural load on walls, beams or footings?",
    "Does the work involve creating a new or widening an existing opening in an exterior wall?",
    "Does the work does not involve adding any new heated space?",
];

/// 是/否答案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
        }
    }
}

impl Not for Answer {
    type Output = Answer;

    fn not(self) -> Answer {
        match self {
            Answer::Yes => Answer::No,
            Answer::No => Answer::Yes,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 严格解析：只接受 "yes" / "no"
impl FromStr for Answer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Answer::Yes),
            "no" => Ok(Answer::No),
            other => Err(format!("invalid answer '{}', expected 'yes' or 'no'", other)),
        }
    }
}

/// 单个问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 0 起始的稳定索引
    pub index: usize,
    pub text: String,
}

/// 问题目录
///
/// 启动时创建，之后只读
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    /// 按顺序分配索引
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let questions = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Question {
                index,
                text: text.into(),
            })
            .collect();
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.questions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> {
        0..self.questions.len()
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTIONS)
    }
}
