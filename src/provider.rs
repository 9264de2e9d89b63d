//! Lesson content provider: the one place that talks to the generative model.
//!
//! Both operations fail open. A lesson request always yields a playable lesson (falling
//! back to the offline lesson), and an illustration request yields `None` on any failure.

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::config::{LessonConfig, Prompts};
use crate::domain::{ImageHandle, LessonContent};
use crate::gemini::Gemini;
use crate::seeds::fallback_lesson;

#[async_trait]
pub trait ContentProvider: Send + Sync {
  /// Never fails: returns fallback content when generation is unavailable.
  async fn fetch_lesson(&self, language: &str, topic: &str) -> LessonContent;

  /// `None` renders as a placeholder on the client.
  async fn fetch_illustration(&self, description: &str) -> Option<ImageHandle>;

  /// Whether generated content is available at all.
  fn is_online(&self) -> bool {
    true
  }
}

/// Drop malformed questions. Returns None when nothing playable remains.
pub fn sanitize_lesson(mut content: LessonContent) -> Option<LessonContent> {
  let before = content.questions.len();
  content.questions.retain(|q| q.is_well_formed());
  let dropped = before - content.questions.len();
  if dropped > 0 {
    warn!(target: "lesson", dropped, kept = content.questions.len(), "Dropped malformed generated questions");
  }
  if content.title.trim().is_empty() {
    content.title = "Lesson".into();
  }
  if content.questions.is_empty() { None } else { Some(content) }
}

/// Gemini-backed provider. Without a client every lesson is the offline lesson.
pub struct GeminiProvider {
  gemini: Option<Gemini>,
  prompts: Prompts,
  questions_per_lesson: usize,
  options_per_question: usize,
}

impl GeminiProvider {
  pub fn new(gemini: Option<Gemini>, config: &LessonConfig) -> Self {
    Self {
      gemini,
      prompts: config.prompts.clone(),
      questions_per_lesson: config.questions_per_lesson,
      options_per_question: config.options_per_question,
    }
  }
}

#[async_trait]
impl ContentProvider for GeminiProvider {
  fn is_online(&self) -> bool {
    self.gemini.is_some()
  }

  #[instrument(level = "info", skip(self), fields(online = self.gemini.is_some()))]
  async fn fetch_lesson(&self, language: &str, topic: &str) -> LessonContent {
    let Some(gemini) = &self.gemini else {
      warn!(target: "lesson", %language, %topic, "GEMINI_API_KEY not set; serving offline lesson");
      return fallback_lesson();
    };

    match gemini
      .generate_lesson(&self.prompts, language, topic, self.questions_per_lesson, self.options_per_question)
      .await
    {
      Ok(content) => match sanitize_lesson(content) {
        Some(content) => {
          info!(target: "lesson", %language, %topic, questions = content.questions.len(), source = "generated", "Lesson ready");
          content
        }
        None => {
          error!(target: "lesson", %language, %topic, "Generated lesson had no usable questions; serving offline lesson");
          fallback_lesson()
        }
      },
      Err(e) => {
        error!(target: "lesson", %language, %topic, error = %e, "Lesson generation failed; serving offline lesson");
        fallback_lesson()
      }
    }
  }

  #[instrument(level = "info", skip(self, description), fields(desc_len = description.len()))]
  async fn fetch_illustration(&self, description: &str) -> Option<ImageHandle> {
    let gemini = self.gemini.as_ref()?;
    match gemini.generate_illustration(&self.prompts, description).await {
      Ok(image) => image,
      Err(e) => {
        error!(target: "lesson", error = %e, "Illustration generation failed; showing placeholder");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ContentSource, Question};

  fn q(options: usize, correct: usize) -> Question {
    Question {
      question_text: "Pick one".into(),
      options: (0..options).map(|i| format!("opt {i}")).collect(),
      correct_answer_index: correct,
      image_description: String::new(),
      explanation: String::new(),
    }
  }

  #[test]
  fn sanitize_keeps_good_questions_only() {
    let content = LessonContent {
      title: "Food".into(),
      questions: vec![q(4, 1), q(1, 0), q(4, 7), q(2, 1)],
      source: ContentSource::Generated,
    };
    let clean = sanitize_lesson(content).expect("playable");
    assert_eq!(clean.questions.len(), 2);
  }

  #[test]
  fn sanitize_rejects_lessons_with_nothing_left() {
    let content = LessonContent { title: String::new(), questions: vec![q(1, 0)], source: ContentSource::Generated };
    assert!(sanitize_lesson(content).is_none());
  }

  #[tokio::test]
  async fn offline_provider_fails_open() {
    let provider = GeminiProvider::new(None, &LessonConfig::default());
    assert!(!provider.is_online());

    let lesson = provider.fetch_lesson("Spanish", "Food").await;
    assert_eq!(lesson.source, ContentSource::Fallback);
    assert!(!lesson.questions.is_empty());

    assert!(provider.fetch_illustration("a cat").await.is_none());
  }
}
