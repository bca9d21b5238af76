// src/services/interview.rs
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;
use crate::error::AppError;

const QUESTIONS_PROMPT: &str = r#"
You are an experienced technical interviewer.

TASK: Write {count} interview questions for a {level} {role} candidate.{topics}

OUTPUT: Return ONLY a valid JSON object, no prose:
{
  "questions": [
    {
      "question": "The question text",
      "category": "technical | behavioral | system-design",
      "difficulty": "easy | medium | hard",
      "answerHint": "What a strong answer covers, in 1-3 sentences"
    }
  ]
}
"#;

const CODING_PROMPT: &str = r#"
You are an experienced technical interviewer preparing a live coding round.

TASK: Write one {difficulty} coding problem about {topic}. Starter code must be {language}.

OUTPUT: Return ONLY a valid JSON object, no prose:
{
  "title": "Short problem title",
  "description": "Full problem statement",
  "examples": [
    { "input": "...", "output": "...", "explanation": "..." }
  ],
  "constraints": ["..."],
  "starterCode": "function signature with an empty body",
  "hints": ["..."]
}
"#;

pub const MAX_QUESTIONS: u32 = 20;
const DEFAULT_QUESTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey => {
                AppError::Unavailable("Interview generation is not configured".to_string())
            }
            other => {
                log::error!("LLM request failed: {}", other);
                AppError::Upstream("Interview generation failed, try again".to_string())
            }
        }
    }
}

/// Fills `{name}` placeholders in one pass; substituted values are never rescanned.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(*name).is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsRequest {
    pub role: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub count: Option<u32>,
}

fn default_level() -> String {
    "mid-level".to_string()
}

impl QuestionsRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.role.trim().is_empty() {
            return Err(AppError::BadRequest("role is required".to_string()));
        }
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count.unwrap_or(DEFAULT_QUESTIONS).clamp(1, MAX_QUESTIONS)
    }

    pub fn prompt(&self) -> String {
        let topics = if self.topics.is_empty() {
            String::new()
        } else {
            format!("\nFocus on these topics: {}.", self.topics.join(", "))
        };
        render(
            QUESTIONS_PROMPT,
            &[
                ("count", &self.count().to_string()),
                ("level", self.level.trim()),
                ("role", self.role.trim()),
                ("topics", &topics),
            ],
        )
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodingRequest {
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub language: Option<String>,
}

impl CodingRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.topic.trim().is_empty() {
            return Err(AppError::BadRequest("topic is required".to_string()));
        }
        Ok(())
    }

    pub fn prompt(&self) -> String {
        let language = self
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("JavaScript");
        render(
            CODING_PROMPT,
            &[
                ("difficulty", self.difficulty.as_str()),
                ("topic", self.topic.trim()),
                ("language", language),
            ],
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestion {
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub answer_hint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuestionSet {
    pub questions: Vec<InterviewQuestion>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProblemExample {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodingProblem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<ProblemExample>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub starter_code: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Thin client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub async fn generate_questions(&self, req: &QuestionsRequest) -> Result<QuestionSet, LlmError> {
        let mut set: QuestionSet = self.complete_json(&req.prompt()).await?;
        set.questions.retain(|q| !q.question.trim().is_empty());
        if set.questions.is_empty() {
            return Err(LlmError::InvalidResponse("no questions returned".to_string()));
        }
        set.questions.truncate(req.count() as usize);
        Ok(set)
    }

    pub async fn generate_coding_problem(&self, req: &CodingRequest) -> Result<CodingProblem, LlmError> {
        self.complete_json(&req.prompt()).await
    }

    async fn complete_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, LlmError> {
        let content = self.complete(prompt).await?;
        parse_model_json(&content)
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if self.config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&serde_json::json!({
                "model": self.config.model,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
                "messages": [
                    { "role": "user", "content": prompt },
                ],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let response = response.json::<serde_json::Value>().await?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::InvalidResponse(format!("unexpected response structure: {}", response))
            })
    }
}

/// Removes markdown code fence markers (```` ```json ````, ```` ``` ````), keeping
/// whatever sits on the same line as a fence.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
}

/// The outermost `{ ... }` span: first `{` to last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_model_json<T: DeserializeOwned>(content: &str) -> Result<T, LlmError> {
    let cleaned = strip_code_fences(content);
    let json = extract_json_object(&cleaned).ok_or_else(|| {
        LlmError::InvalidResponse("no JSON object in model output".to_string())
    })?;
    Ok(serde_json::from_str(json)?)
}
