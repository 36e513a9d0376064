//! 提交流程 - 流程层
//!
//! 三个阶段依次进行，阶段之间通过会话存储传递数据：
//!
//! 1. `Intake`：收集全部答案和一个 PDF，调用校验服务，保存 `validationResult`
//! 2. `Reconciliation`：读取 `validationResult`，处理分歧，保存 `finalAnswers`
//! 3. `Confirmation`：读取 `finalAnswers`，完成后清空会话
//!
//! 缺少前一阶段的数据时返回 `MissingPrecondition`，调用方应回到第一阶段。

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AnalyzerError, FlowError};
use crate::models::{Answer, PdfDocument, QuestionCatalog, UserAnswers, ValidationResult};
use crate::services::ValidationService;
use crate::workflow::reconciliation::{FinalAnswerSet, Reconciliation};
use crate::workflow::session_store::{SessionStorage, FINAL_ANSWERS_KEY, VALIDATION_RESULT_KEY};

/// 流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intake,
    Reconciliation,
    Confirmation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Intake => f.write_str("intake"),
            Stage::Reconciliation => f.write_str("reconciliation"),
            Stage::Confirmation => f.write_str("confirmation"),
        }
    }
}

/// 第一阶段的表单
#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    answers: BTreeMap<usize, Answer>,
    document: Option<PdfDocument>,
}

impl IntakeForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_answer(&mut self, index: usize, answer: Answer) {
        self.answers.insert(index, answer);
    }

    pub fn attach(&mut self, document: PdfDocument) {
        self.document = Some(document);
    }

    pub fn is_complete(&self, catalog: &QuestionCatalog) -> bool {
        self.document.is_some() && catalog.indices().all(|i| self.answers.contains_key(&i))
    }

    /// 表单完整时拆分为答案和文档
    fn into_submission(
        self,
        catalog: &QuestionCatalog,
    ) -> Result<(UserAnswers, PdfDocument), AnalyzerError> {
        let complete = catalog.indices().all(|i| self.answers.contains_key(&i));
        let (true, Some(document)) = (complete, self.document) else {
            return Err(AnalyzerError::InvalidInput(
                "Please answer all questions and upload a PDF file".to_string(),
            ));
        };
        let answers = self
            .answers
            .into_iter()
            .filter(|(index, _)| catalog.contains(*index))
            .collect();
        Ok((answers, document))
    }
}

/// 给用户的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub duration: Duration,
    /// 配额耗尽时使用更醒目的样式
    pub prominent: bool,
}

impl Notice {
    pub fn from_error(err: &AnalyzerError) -> Self {
        if err.is_quota_exceeded() {
            Self {
                message: "Service quota exceeded! Please contact support.".to_string(),
                duration: Duration::from_secs(8),
                prominent: true,
            }
        } else {
            Self {
                message: err.to_string(),
                duration: Duration::from_secs(5),
                prominent: false,
            }
        }
    }
}

/// 重置进行中标记
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 提交流程控制器
///
/// 一个实例对应一个用户会话
pub struct SubmissionFlow<V, S> {
    catalog: QuestionCatalog,
    validator: V,
    storage: S,
    in_flight: AtomicBool,
}

impl<V: ValidationService, S: SessionStorage> SubmissionFlow<V, S> {
    pub fn new(catalog: QuestionCatalog, validator: V, storage: S) -> Self {
        Self {
            catalog,
            validator,
            storage,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 根据会话中已有的数据判断当前阶段
    pub fn stage(&self) -> Stage {
        if self.storage.get_item(FINAL_ANSWERS_KEY).is_some() {
            Stage::Confirmation
        } else if self.storage.get_item(VALIDATION_RESULT_KEY).is_some() {
            Stage::Reconciliation
        } else {
            Stage::Intake
        }
    }

    /// 是否有校验请求正在进行
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 第一阶段：提交答案和文档
    ///
    /// 请求进行期间再次提交会返回 `SubmissionInFlight`；失败时不保存任何结果
    pub async fn submit_intake(&self, form: IntakeForm) -> Result<ValidationResult, FlowError> {
        let (answers, document) = form.into_submission(&self.catalog)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("⚠️ 已有提交正在处理中，忽略重复提交");
            return Err(FlowError::SubmissionInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        info!("📄 提交 {} 个答案和文档 {}", answers.len(), document.filename());
        let result = self.validator.validate(&answers, &document).await?;

        self.store(VALIDATION_RESULT_KEY, &result)?;
        self.storage.remove_item(FINAL_ANSWERS_KEY);
        Ok(result)
    }

    /// 第二阶段：根据保存的校验结果开始核对
    pub fn enter_reconciliation(&self) -> Result<Reconciliation, FlowError> {
        let result: ValidationResult = self
            .load(VALIDATION_RESULT_KEY)
            .ok_or(FlowError::MissingPrecondition(Stage::Reconciliation))?;

        Reconciliation::new(&self.catalog, result).map_err(|e| {
            warn!("⚠️ 校验结果无法用于核对: {}", e);
            FlowError::MissingPrecondition(Stage::Reconciliation)
        })
    }

    /// 所有分歧解决后保存最终答案
    pub fn submit_answers(&self, reconciliation: &Reconciliation) -> Result<FinalAnswerSet, FlowError> {
        let final_answers = reconciliation.finalize()?;
        self.store(FINAL_ANSWERS_KEY, &final_answers)?;
        info!("✓ 最终答案已保存 ({} 个问题)", final_answers.len());
        Ok(final_answers)
    }

    /// 放弃当前结果，回到第一阶段
    pub fn start_over(&self) {
        self.storage.remove_item(VALIDATION_RESULT_KEY);
        self.storage.remove_item(FINAL_ANSWERS_KEY);
    }

    /// 第三阶段：读取最终答案
    pub fn enter_confirmation(&self) -> Result<FinalAnswerSet, FlowError> {
        let final_answers: FinalAnswerSet = self
            .load(FINAL_ANSWERS_KEY)
            .ok_or(FlowError::MissingPrecondition(Stage::Confirmation))?;

        if !final_answers.is_complete(&self.catalog) {
            warn!("⚠️ 会话中的最终答案不完整");
            return Err(FlowError::MissingPrecondition(Stage::Confirmation));
        }
        Ok(final_answers)
    }

    /// 完成提交，清空会话
    pub fn finish(&self) {
        self.start_over();
        info!("🏁 提交完成，会话已清空");
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<(), FlowError> {
        let json = serde_json::to_string(value)?;
        self.storage.set_item(key, json);
        Ok(())
    }

    /// 读取并反序列化；内容损坏时视为不存在
    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.get_item(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ 会话数据 {} 解析失败: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::models::{AiAnswer, AiResponse};
    use crate::workflow::reconciliation::QuestionStatus;
    use crate::workflow::session_store::MemorySessionStorage;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    /// 返回固定分析答案的校验服务
    struct StubValidation {
        ai: Result<AiResponse, AnalyzerError>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ValidationService for StubValidation {
        async fn validate(
            &self,
            answers: &UserAnswers,
            _document: &PdfDocument,
        ) -> Result<ValidationResult, AnalyzerError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(ValidationResult {
                user_answers: answers.clone(),
                ai_answers: self.ai.clone()?,
            })
        }
    }

    fn catalog() -> QuestionCatalog {
        QuestionCatalog::new(["q0", "q1", "q2"])
    }

    fn flow(ai: Result<AiResponse, AnalyzerError>) -> SubmissionFlow<StubValidation, MemorySessionStorage> {
        SubmissionFlow::new(
            catalog(),
            StubValidation { ai, gate: None },
            MemorySessionStorage::new(),
        )
    }

    fn form(answers: [Answer; 3]) -> IntakeForm {
        let mut form = IntakeForm::new();
        for (i, a) in answers.into_iter().enumerate() {
            form.set_answer(i, a);
        }
        form.attach(PdfDocument::new("plan.pdf", None, b"%PDF-1.6".to_vec()).unwrap());
        form
    }

    fn ai(answers: &[(usize, &str)]) -> AiResponse {
        answers
            .iter()
            .map(|(i, a)| (*i, AiAnswer::new(*a, "see sheet A1")))
            .collect()
    }

    #[tokio::test]
    async fn test_full_flow_with_one_mismatch() {
        let flow = flow(Ok(ai(&[(0, "yes"), (1, "yes"), (2, "no")])));
        assert_eq!(flow.stage(), Stage::Intake);

        assert_ok!(flow.submit_intake(form([Answer::Yes, Answer::No, Answer::No])).await);
        assert_eq!(flow.stage(), Stage::Reconciliation);

        let mut rec = assert_ok!(flow.enter_reconciliation());
        assert_eq!(rec.unresolved(), vec![1]);
        assert!(matches!(
            flow.submit_answers(&rec),
            Err(FlowError::Reconcile(ReconcileError::Unresolved(_)))
        ));

        rec.change(1).unwrap();
        let stored = assert_ok!(flow.submit_answers(&rec));
        assert_eq!(flow.stage(), Stage::Confirmation);

        let reloaded = assert_ok!(flow.enter_confirmation());
        assert_eq!(reloaded, stored);
        assert_eq!(reloaded.get(1).unwrap().current_answer, Answer::Yes);
        assert_eq!(reloaded.get(1).unwrap().status, QuestionStatus::Changed);

        flow.finish();
        assert_eq!(flow.stage(), Stage::Intake);
        assert!(flow.storage().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_form_is_rejected_before_validation() {
        let flow = flow(Ok(AiResponse::new()));
        let mut incomplete = IntakeForm::new();
        incomplete.set_answer(0, Answer::Yes);

        let err = assert_err!(flow.submit_intake(incomplete).await);
        assert!(matches!(err, FlowError::Analyzer(AnalyzerError::InvalidInput(_))));
        assert_eq!(flow.stage(), Stage::Intake);
    }

    #[tokio::test]
    async fn test_answers_without_document_are_rejected() {
        let flow = flow(Ok(AiResponse::new()));
        let mut no_document = IntakeForm::new();
        for i in 0..3 {
            no_document.set_answer(i, Answer::No);
        }
        assert!(!no_document.is_complete(flow.catalog()));

        let err = assert_err!(flow.submit_intake(no_document).await);
        assert!(matches!(
            err,
            FlowError::Analyzer(AnalyzerError::InvalidInput(ref msg))
                if msg == "Please answer all questions and upload a PDF file"
        ));
    }

    #[tokio::test]
    async fn test_failed_validation_stores_nothing() {
        let flow = flow(Err(AnalyzerError::QuotaExceeded));
        let err = assert_err!(flow.submit_intake(form([Answer::Yes; 3])).await);

        match err {
            FlowError::Analyzer(e) => {
                let notice = Notice::from_error(&e);
                assert!(notice.prominent);
                assert_eq!(notice.duration, Duration::from_secs(8));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(flow.storage().is_empty());
        assert!(!flow.is_submitting());
    }

    #[tokio::test]
    async fn test_later_stages_without_state_redirect() {
        let flow = flow(Ok(AiResponse::new()));
        let err = assert_err!(flow.enter_reconciliation());
        assert!(err.is_redirect());
        let err = assert_err!(flow.enter_confirmation());
        assert!(matches!(err, FlowError::MissingPrecondition(Stage::Confirmation)));
    }

    #[tokio::test]
    async fn test_corrupt_session_data_redirects() {
        let flow = flow(Ok(AiResponse::new()));
        flow.storage().set_item(VALIDATION_RESULT_KEY, "not json".to_string());
        assert!(assert_err!(flow.enter_reconciliation()).is_redirect());

        flow.storage().set_item(
            FINAL_ANSWERS_KEY,
            r#"{"0":{"currentAnswer":"yes","status":"mismatch"}}"#.to_string(),
        );
        assert!(assert_err!(flow.enter_confirmation()).is_redirect());
    }

    #[tokio::test]
    async fn test_start_over_discards_result() {
        let flow = flow(Ok(ai(&[(0, "no")])));
        assert_ok!(flow.submit_intake(form([Answer::Yes; 3])).await);
        flow.start_over();
        assert_eq!(flow.stage(), Stage::Intake);
        assert!(flow.enter_reconciliation().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let flow = Arc::new(SubmissionFlow::new(
            catalog(),
            StubValidation {
                ai: Ok(ai(&[(0, "yes"), (1, "yes"), (2, "yes")])),
                gate: Some(gate.clone()),
            },
            MemorySessionStorage::new(),
        ));

        let first = {
            let flow = flow.clone();
            tokio::spawn(async move { flow.submit_intake(form([Answer::Yes; 3])).await })
        };
        while !flow.is_submitting() {
            tokio::task::yield_now().await;
        }

        let err = assert_err!(flow.submit_intake(form([Answer::Yes; 3])).await);
        assert!(matches!(err, FlowError::SubmissionInFlight));

        gate.notify_one();
        assert_ok!(first.await.unwrap());
        assert!(!flow.is_submitting());

        let rec = assert_ok!(flow.enter_reconciliation());
        assert!(rec.can_submit());
    }

    #[test]
    fn test_regular_notice() {
        let notice = Notice::from_error(&AnalyzerError::UploadFailed("upload broke".into()));
        assert_eq!(notice.message, "upload broke");
        assert_eq!(notice.duration, Duration::from_secs(5));
        assert!(!notice.prominent);
    }
}
