use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use crate::clients::{OpenAiClient, ValidateClient};
use crate::config::Config;
use crate::error::FlowError;
use crate::models::{load_catalog, Answer, PdfDocument, QuestionCatalog, PDF_CONTENT_TYPE};
use crate::server::{self, AppState};
use crate::services::{DocumentValidation, GatewayAnalyzer};
use crate::utils::logging::log_startup;
use crate::workflow::{
    FinalAnswerSet, IntakeForm, MemorySessionStorage, Notice, QuestionStatus, Reconciliation,
    SubmissionFlow,
};

type Prompt = Lines<BufReader<Stdin>>;

/// 应用主结构
pub struct App {
    config: Config,
    catalog: QuestionCatalog,
}

impl App {
    /// 初始化应用：加载问题目录
    pub async fn initialize(config: Config) -> Result<Self> {
        let catalog = load_catalog(config.questions_file.as_deref()).await?;
        info!("✓ 问题目录已加载: {} 个问题", catalog.len());
        Ok(Self { config, catalog })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// 启动校验服务
    pub async fn serve(&self) -> Result<()> {
        log_startup(&self.config, "校验服务模式");

        let client = OpenAiClient::from_config(&self.config).context("无法创建分析服务客户端")?;
        if client.is_none() {
            warn!("⚠️ 未配置 OPENAI_API_KEY，校验请求将返回 not configured");
        }
        let analyzer = GatewayAnalyzer::new(client, self.config.analyzer_timeout());
        let validation = DocumentValidation::new(self.catalog.clone(), analyzer);
        let state = AppState::new(Arc::new(validation), self.config.max_upload_bytes);

        server::serve(&self.config.listen_addr, state).await
    }

    /// 交互式提交：填写 → 核对 → 确认
    ///
    /// `answers` 按问题顺序给出，缺少的部分在终端中询问
    pub async fn submit(&self, pdf_path: &Path, answers: &[Answer]) -> Result<()> {
        log_startup(&self.config, "交互提交模式");

        let client = ValidateClient::new(&self.config.server_url, self.config.http_timeout())
            .context("无法创建校验接口客户端")?;
        let flow = SubmissionFlow::new(self.catalog.clone(), client, MemorySessionStorage::new());
        let mut prompt = BufReader::new(tokio::io::stdin()).lines();

        // ① 填写
        let form = self.build_form(pdf_path, answers, &mut prompt).await?;
        println!("\n⏳ 正在分析文档，请稍候...");
        if let Err(e) = flow.submit_intake(form).await {
            if let FlowError::Analyzer(err) = &e {
                print_notice(&Notice::from_error(err));
            }
            return Err(e).context("提交失败");
        }

        // ② 核对
        let mut reconciliation = flow.enter_reconciliation()?;
        self.resolve_mismatches(&mut reconciliation, &mut prompt).await?;
        flow.submit_answers(&reconciliation)?;

        // ③ 确认
        let final_answers = flow.enter_confirmation()?;
        self.print_confirmation(&final_answers);
        flow.finish();

        Ok(())
    }

    async fn build_form(
        &self,
        pdf_path: &Path,
        answers: &[Answer],
        prompt: &mut Prompt,
    ) -> Result<IntakeForm> {
        let bytes = tokio::fs::read(pdf_path)
            .await
            .with_context(|| format!("无法读取文件: {}", pdf_path.display()))?;
        let filename = pdf_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let is_pdf = pdf_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let content_type = if is_pdf { PDF_CONTENT_TYPE } else { "application/octet-stream" };
        let document = PdfDocument::new(filename, Some(content_type), bytes)?;

        if answers.len() > self.catalog.len() {
            warn!(
                "⚠️ 给出了 {} 个答案，只使用前 {} 个",
                answers.len(),
                self.catalog.len()
            );
        }

        let mut form = IntakeForm::new();
        form.attach(document);
        for question in self.catalog.iter() {
            let answer = match answers.get(question.index) {
                Some(answer) => *answer,
                None => ask_answer(prompt, question.index, &question.text).await?,
            };
            form.set_answer(question.index, answer);
        }
        Ok(form)
    }

    async fn resolve_mismatches(
        &self,
        reconciliation: &mut Reconciliation,
        prompt: &mut Prompt,
    ) -> Result<()> {
        let mismatches = reconciliation.unresolved();
        if mismatches.is_empty() {
            println!("\n✅ 所有答案与文档分析一致");
            return Ok(());
        }

        println!("\n⚠️ 有 {} 个答案与文档分析不一致", mismatches.len());
        for index in mismatches {
            let text = self
                .catalog
                .get(index)
                .map(|q| q.text.as_str())
                .unwrap_or_default();
            println!("\n{}", "─".repeat(60));
            println!("问题 {}: {}", index + 1, text);
            if let Some(original) = reconciliation.original_answer(index) {
                println!("  你的答案: {}", original);
            }
            match reconciliation.ai_answer(index) {
                Some(ai) => {
                    println!("  分析结果: {}", ai.answer);
                    if !ai.reasoning.is_empty() {
                        println!("  理由: {}", ai.reasoning);
                    }
                }
                None => println!("  分析结果: (无)"),
            }

            loop {
                match read_line(prompt, "保留原答案 [k] / 修改答案 [c]: ").await?.as_str() {
                    "k" | "keep" => {
                        reconciliation.confirm(index)?;
                        break;
                    }
                    "c" | "change" => {
                        let state = reconciliation.change(index)?;
                        println!("  已改为: {}", state.current_answer);
                        break;
                    }
                    _ => println!("请输入 k 或 c"),
                }
            }
        }

        if !reconciliation.can_submit() {
            bail!("仍有未解决的分歧: {:?}", reconciliation.unresolved());
        }
        Ok(())
    }

    fn print_confirmation(&self, final_answers: &FinalAnswerSet) {
        println!("\n{}", "=".repeat(60));
        println!("📋 最终答案");
        println!(
            "提交时间: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        println!("{}", "=".repeat(60));
        for (index, state) in final_answers.iter() {
            let text = self
                .catalog
                .get(index)
                .map(|q| q.text.as_str())
                .unwrap_or_default();
            let mark = match state.status {
                QuestionStatus::Match => "✓",
                QuestionStatus::Confirmed => "保留",
                QuestionStatus::Changed => "已修改",
                QuestionStatus::Mismatch => "?",
            };
            println!("{:>2}. [{}] {} ({})", index + 1, state.current_answer, text, mark);
        }
        println!("{}", "=".repeat(60));
        println!("✅ 提交完成");
    }
}

async fn ask_answer(prompt: &mut Prompt, index: usize, text: &str) -> Result<Answer> {
    println!("\n问题 {}: {}", index + 1, text);
    loop {
        let line = read_line(prompt, "请输入 yes / no: ").await?;
        match line.parse::<Answer>() {
            Ok(answer) => return Ok(answer),
            Err(e) => println!("{}", e),
        }
    }
}

async fn read_line(prompt: &mut Prompt, label: &str) -> Result<String> {
    print!("{}", label);
    std::io::Write::flush(&mut std::io::stdout())?;
    match prompt.next_line().await? {
        Some(line) => Ok(line.trim().to_lowercase()),
        None => bail!("输入已结束"),
    }
}

fn print_notice(notice: &Notice) {
    if notice.prominent {
        println!("\n{}", "!".repeat(60));
        println!("🚫 {}", notice.message);
        println!("{}", "!".repeat(60));
    } else {
        println!("\n❌ {}", notice.message);
    }
}
