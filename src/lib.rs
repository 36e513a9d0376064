//! # Plan Validator
//!
//! 建筑平面图是非题校验：用户回答一组是非题并上传平面图 PDF，
//! 文档分析服务给出自己的判断，用户逐一处理分歧后得到最终答案
//!
//! ## 架构设计
//!
//! ### ① 接入层（Clients / Server）
//! - `clients/openai_client` - 文件上传、分析、删除的原始接口
//! - `clients/validate_client` - 通过 HTTP 调用校验接口
//! - `server/` - `POST /api/validate` 与 `GET /healthz`
//!
//! ### ② 业务能力层（Services）
//! - `GatewayAnalyzer` - 上传 → 分析 → 解析 → 删除，保证上传的文件被清理
//! - `DocumentValidation` - 检查输入并组合出 `ValidationResult`
//!
//! ### ③ 流程层（Workflow）
//! - `Reconciliation` - 每个问题的 match / mismatch / confirmed / changed 状态机
//! - `SubmissionFlow` - 填写 → 核对 → 确认，阶段间通过会话存储传递数据
//!
//! ### ④ 编排层（App）
//! - `App` - 组装配置、问题目录和各层组件，提供 `serve` 与 `submit` 两种模式
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AnalyzerError, FlowError, ReconcileError};
pub use models::{Answer, QuestionCatalog, UserAnswers, ValidationResult};
pub use services::{DocumentAnalyzer, DocumentValidation, GatewayAnalyzer, ValidationService};
pub use workflow::{Reconciliation, SubmissionFlow};
