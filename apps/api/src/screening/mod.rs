// AI-assisted screening: resume extraction and persona matching.
// All model calls go through llm_client.

pub mod handlers;
pub mod matching;
pub mod prompts;
pub mod resume;
