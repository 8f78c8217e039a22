// Screening prompt templates.

pub const RESUME_EXTRACT_SYSTEM: &str = "\
You are an expert recruitment assistant that turns raw CV text into structured data. \
You MUST respond with valid JSON only. If a field is missing, use an empty string or array. \
Never invent employers, roles or skills that are not in the text.";

pub const RESUME_EXTRACT_PROMPT: &str = r#"Analyze the following raw CV text and extract it into JSON.

TEXT:
{raw_text}

OUTPUT SCHEMA (return exactly this structure):
{
  "name": "Full Name",
  "contact": "Email or phone",
  "skills": ["Skill"],
  "experience": [
    { "company": "Company Name", "role": "Position", "years": "Duration" }
  ],
  "summary": "Brief professional overview"
}"#;

pub const NEURAL_MATCH_SYSTEM: &str = "\
You are a recruitment matching engine. Rank candidates against a job persona \
by semantic similarity, experience alignment and skill overlap. \
You MUST respond with a JSON array only.";

pub const NEURAL_MATCH_PROMPT: &str = r#"Compare the job persona with each candidate.

JOB PERSONA:
{persona}

CANDIDATES:
{candidates}

OUTPUT SCHEMA (one object per candidate):
[
  { "candidateId": "ID from the input", "matchScore": 0-100, "reasoning": "One or two sentences" }
]"#;
