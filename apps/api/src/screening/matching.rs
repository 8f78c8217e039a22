//! Persona matching: ranks a shortlist of candidates against a job persona.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::screening::prompts::{NEURAL_MATCH_PROMPT, NEURAL_MATCH_SYSTEM};

pub const MAX_CANDIDATES: usize = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: String,
    /// Structured profile, typically an extracted resume.
    pub profile: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMatch {
    pub candidate_id: String,
    pub match_score: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Rejects inputs the model should never see. Cheap enough to run before
/// the caller is charged.
pub fn validate_match_input(persona: &str, candidates: &[CandidateSummary]) -> Result<(), AppError> {
    if persona.trim().is_empty() {
        return Err(AppError::Validation("persona is required".to_string()));
    }
    if candidates.is_empty() || candidates.len() > MAX_CANDIDATES {
        return Err(AppError::Validation(format!(
            "between 1 and {MAX_CANDIDATES} candidates are required"
        )));
    }
    Ok(())
}

pub async fn neural_match(
    persona: &str,
    candidates: &[CandidateSummary],
    llm: &LlmClient,
) -> Result<Vec<CandidateMatch>, AppError> {
    validate_match_input(persona, candidates)?;

    let candidates_json = serde_json::to_string(candidates)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("candidate encoding failed: {e}")))?;
    let prompt = NEURAL_MATCH_PROMPT
        .replace("{persona}", persona.trim())
        .replace("{candidates}", &candidates_json);

    let raw: Vec<CandidateMatch> = llm
        .call_json(&prompt, NEURAL_MATCH_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Neural match failed: {e}")))?;

    Ok(normalize_matches(raw, candidates))
}

/// Drops ids the model invented or repeated, clamps scores to 0–100 and
/// sorts best first.
pub fn normalize_matches(
    raw: Vec<CandidateMatch>,
    candidates: &[CandidateSummary],
) -> Vec<CandidateMatch> {
    let known: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    let mut seen = HashSet::new();

    let mut matches: Vec<CandidateMatch> = raw
        .into_iter()
        .filter(|m| known.contains(m.candidate_id.as_str()))
        .filter(|m| seen.insert(m.candidate_id.clone()))
        .map(|mut m| {
            m.match_score = if m.match_score.is_finite() {
                m.match_score.clamp(0.0, 100.0).round()
            } else {
                0.0
            };
            m
        })
        .collect();

    matches.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    matches
}
