//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent`, requesting either a JSON object that
//! follows a response schema (lessons) or inline image data (illustrations).
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key; it travels in the `x-goog-api-key` header, not the URL.

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{ContentSource, ImageHandle, LessonContent, Question};
use crate::util::{fill_template, trunc_for_log};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeminiError {
  #[error("Gemini HTTP {status}: {message}")]
  HttpStatus { status: reqwest::StatusCode, message: String },
  #[error("Gemini returned an empty response")]
  EmptyResponse,
  #[error("JSON parse error: {0}")]
  Decode(#[from] serde_json::Error),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub text_model: String,
  pub image_model: String,
}

/// Lesson shape requested from the text model.
#[derive(Deserialize)]
struct GenLesson {
  title: String,
  // Items are decoded one by one so a single malformed question does not sink the lesson.
  questions: Vec<Value>,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY (or API_KEY); otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let text_model =
      std::env::var("GEMINI_TEXT_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    let image_model =
      std::env::var("GEMINI_IMAGE_MODEL").unwrap_or_else(|_| "gemini-2.5-flash-image".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, text_model, image_model })
  }

  /// Single-turn generateContent call.
  #[instrument(level = "info", skip(self, prompt, generation_config), fields(model = %model, prompt_len = prompt.len()))]
  async fn generate(
    &self,
    model: &str,
    prompt: &str,
    generation_config: Value,
  ) -> Result<GenerateResponse, GeminiError> {
    let url = format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), model);
    let req = GenerateRequest {
      contents: vec![Content {
        role: "user".into(),
        parts: vec![json!({ "text": prompt })],
      }],
      generation_config,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "lingoai-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(GeminiError::HttpStatus { status, message });
    }

    let body: GenerateResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(
        elapsed = ?start.elapsed(),
        prompt_tokens = ?usage.prompt_token_count,
        candidates_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }
    Ok(body)
  }

  // --- High-level helpers (domain-specialized) ---

  /// Generate a lesson for `language`/`topic`. Content is returned as-is; callers sanitize.
  #[instrument(level = "info", skip(self, prompts), fields(%language, %topic, model = %self.text_model))]
  pub async fn generate_lesson(
    &self,
    prompts: &Prompts,
    language: &str,
    topic: &str,
    questions: usize,
    options: usize,
  ) -> Result<LessonContent, GeminiError> {
    let questions_s = questions.to_string();
    let options_s = options.to_string();
    let prompt = fill_template(
      &prompts.lesson_template,
      &[("language", language), ("topic", topic), ("questions", &questions_s), ("options", &options_s)],
    );
    let config = json!({
      "responseMimeType": "application/json",
      "responseSchema": lesson_schema(),
    });

    let body = self.generate(&self.text_model, &prompt, config).await?;
    let text = body.first_text().ok_or(GeminiError::EmptyResponse)?;
    let lesson = parse_lesson(&text)?;

    info!(title = %lesson.title, questions = lesson.questions.len(), "Lesson generated");
    Ok(lesson)
  }

  /// Render an illustration. `Ok(None)` when the model answered without usable image data.
  #[instrument(level = "info", skip(self, prompts, description), fields(desc_len = description.len(), model = %self.image_model))]
  pub async fn generate_illustration(
    &self,
    prompts: &Prompts,
    description: &str,
  ) -> Result<Option<ImageHandle>, GeminiError> {
    let prompt = fill_template(&prompts.illustration_template, &[("description", description)]);
    let config = json!({ "responseModalities": ["IMAGE"] });

    let body = self.generate(&self.image_model, &prompt, config).await?;
    let image = body
      .inline_images()
      .find_map(|d| ImageHandle::from_inline(&d.mime_type, &d.data));
    if image.is_none() {
      error!("Gemini response carried no usable inline image");
    }
    Ok(image)
  }
}

/// Decode the model's lesson JSON. Questions that do not match the `Question` shape
/// (negative or fractional index, missing fields) are dropped here; the provider's
/// sanitizer handles the structurally-valid-but-unplayable ones.
fn parse_lesson(text: &str) -> Result<LessonContent, GeminiError> {
  let gen: GenLesson = serde_json::from_str(text)?;
  let questions = gen
    .questions
    .into_iter()
    .enumerate()
    .filter_map(|(i, raw)| match serde_json::from_value::<Question>(raw) {
      Ok(q) => Some(q),
      Err(e) => {
        warn!(index = i, error = %e, "Dropping undecodable generated question");
        None
      }
    })
    .collect();
  Ok(LessonContent { title: gen.title, questions, source: ContentSource::Generated })
}

/// Response schema mirroring `Question` (camelCase field names).
fn lesson_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "title": { "type": "STRING" },
      "questions": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "questionText": { "type": "STRING" },
            "options": { "type": "ARRAY", "items": { "type": "STRING" } },
            "correctAnswerIndex": { "type": "INTEGER" },
            "imageDescription": { "type": "STRING" },
            "explanation": { "type": "STRING" }
          },
          "required": ["questionText", "options", "correctAnswerIndex", "imageDescription", "explanation"]
        }
      }
    },
    "required": ["title", "questions"]
  })
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  contents: Vec<Content>,
  generation_config: Value,
}
#[derive(Serialize)]
struct Content { role: String, parts: Vec<Value> }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<Part> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(default)] text: Option<String>,
  #[serde(default)] inline_data: Option<InlineData>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData { mime_type: String, data: String }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateResponse {
  fn parts(&self) -> impl Iterator<Item = &Part> {
    self.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .into_iter()
      .flat_map(|c| c.parts.iter())
  }

  /// Concatenated text of the first candidate, if any.
  fn first_text(&self) -> Option<String> {
    let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
  }

  fn inline_images(&self) -> impl Iterator<Item = &InlineData> {
    self.parts().filter_map(|p| p.inline_data.as_ref())
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
