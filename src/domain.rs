//! Domain models used by the backend: questions, lesson content, languages, image handles.

use serde::{Deserialize, Serialize};

/// One multiple-choice question. Immutable once received from the content provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub question_text: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  /// Empty means "no illustration".
  #[serde(default)] pub image_description: String,
  #[serde(default)] pub explanation: String,
}

impl Question {
  /// Structural checks: non-empty text, at least two options, correct index in range.
  pub fn is_well_formed(&self) -> bool {
    !self.question_text.trim().is_empty()
      && self.options.len() >= 2
      && self.correct_answer_index < self.options.len()
  }

  pub fn correct_option(&self) -> Option<&str> {
    self.options.get(self.correct_answer_index).map(String::as_str)
  }
}

/// Where did the lesson come from?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
  Generated, // produced by the generative model
  Fallback,  // built-in offline lesson
}

/// A lesson: a title plus an ordered, non-empty list of questions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
  pub title: String,
  pub questions: Vec<Question>,
  pub source: ContentSource,
}

/// Entry of the language catalogue offered on the welcome screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOption {
  pub code: String,
  pub name: String,
  pub flag: String,
}

/// Rendered illustration as a `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl ImageHandle {
  /// Build a handle from inline image data returned by the model.
  /// Returns None unless the mime type is an image and the payload is valid base64.
  pub fn from_inline(mime: &str, data_b64: &str) -> Option<Self> {
    use base64::Engine as _;

    if !mime.starts_with("image/") || data_b64.is_empty() {
      return None;
    }
    base64::engine::general_purpose::STANDARD.decode(data_b64).ok()?;
    Some(Self(format!("data:{};base64,{}", mime, data_b64)))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}
