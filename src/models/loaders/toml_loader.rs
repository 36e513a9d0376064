use crate::models::question::QuestionCatalog;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 目录文件格式
///
/// ```toml
/// [[questions]]
/// text = "Are there structural changes?"
/// ```
#[derive(Debug, Deserialize)]
struct CatalogFile {
    questions: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    text: String,
}

/// 从 TOML 文件加载问题目录，索引按出现顺序分配
pub async fn load_catalog_from_toml(toml_file_path: &Path) -> Result<QuestionCatalog> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取问题目录文件: {}", toml_file_path.display()))?;

    parse_catalog(&content)
        .with_context(|| format!("无法解析问题目录文件: {}", toml_file_path.display()))
}

/// 有路径就从文件加载，否则使用内置目录
pub async fn load_catalog(questions_file: Option<&str>) -> Result<QuestionCatalog> {
    match questions_file {
        Some(path) => {
            let catalog = load_catalog_from_toml(Path::new(path)).await?;
            tracing::info!("✓ 从 {} 加载了 {} 个问题", path, catalog.len());
            Ok(catalog)
        }
        None => {
            let catalog = QuestionCatalog::default();
            tracing::info!("使用内置问题目录 ({} 个问题)", catalog.len());
            Ok(catalog)
        }
    }
}

fn parse_catalog(content: &str) -> Result<QuestionCatalog> {
    let file: CatalogFile = toml::from_str(content)?;

    if file.questions.is_empty() {
        anyhow::bail!("问题目录为空");
    }
    if let Some(pos) = file.questions.iter().position(|q| q.text.trim().is_empty()) {
        anyhow::bail!("第 {} 个问题内容为空", pos);
    }

    Ok(QuestionCatalog::new(
        file.questions.into_iter().map(|q| q.text),
    ))
}
