//! Resume extraction: raw CV text (or a PDF) to structured profile data.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::screening::prompts::{RESUME_EXTRACT_PROMPT, RESUME_EXTRACT_SYSTEM};

/// Upper bound on CV text sent to the model.
pub const MAX_RESUME_CHARS: usize = 50_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceItem {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub years: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedResume {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceItem>,
    #[serde(default)]
    pub summary: String,
}

/// Trims the text and rejects empty input; long input is cut at a char boundary.
pub fn prepare_text(raw_text: &str) -> Result<&str, AppError> {
    let text = raw_text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("resume text is empty".to_string()));
    }
    Ok(match text.char_indices().nth(MAX_RESUME_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    })
}

pub async fn extract_resume(raw_text: &str, llm: &LlmClient) -> Result<ExtractedResume, AppError> {
    let text = prepare_text(raw_text)?;
    let prompt = RESUME_EXTRACT_PROMPT.replace("{raw_text}", text);
    llm.call_json::<ExtractedResume>(&prompt, RESUME_EXTRACT_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Resume extraction failed: {e}")))
}

/// Extracts text from an uploaded PDF.
pub fn pdf_text(bytes: &[u8]) -> Result<String, AppError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Validation(format!("Could not read PDF: {e:?}")))
}
