//! 上传的 PDF 文档

use crate::error::AnalyzerError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// 通过校验的 PDF 文档
///
/// 只能经由 [`PdfDocument::new`] 构造，保证内容以 `%PDF-` 开头
#[derive(Clone, PartialEq, Eq)]
pub struct PdfDocument {
    filename: String,
    bytes: Vec<u8>,
}

impl PdfDocument {
    /// 校验并创建文档
    ///
    /// # 参数
    /// - `filename`: 原始文件名
    /// - `content_type`: 声明的类型（可选），存在时必须是 `application/pdf`
    /// - `bytes`: 文件内容
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, AnalyzerError> {
        let declared_pdf = content_type
            .map(|ct| ct.split(';').next().unwrap_or_default().trim() == PDF_CONTENT_TYPE)
            .unwrap_or(true);

        if !declared_pdf || !bytes.starts_with(PDF_SIGNATURE) {
            return Err(AnalyzerError::InvalidInput(
                "Please select a valid PDF file".to_string(),
            ));
        }

        let filename = filename.into();
        let filename = if filename.trim().is_empty() {
            "plan.pdf".to_string()
        } else {
            filename
        };

        Ok(Self { filename, bytes })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}
