//! Loading lesson configuration (prompts, catalogue, lesson shape) from TOML.
//!
//! See `LessonConfig` and `Prompts` for expected schema. Every field is optional.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::LanguageOption;
use crate::progress::MAX_HEARTS;
use crate::seeds::{default_languages, default_topics};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LessonConfig {
  pub prompts: Prompts,
  pub languages: Vec<LanguageOption>,
  pub topics: Vec<String>,
  pub max_hearts: u8,
  pub questions_per_lesson: usize,
  pub options_per_question: usize,
}

impl Default for LessonConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      languages: default_languages(),
      topics: default_topics(),
      max_hearts: MAX_HEARTS,
      questions_per_lesson: 4,
      options_per_question: 4,
    }
  }
}

/// Prompts used by the Gemini client. Templates accept `{language}`, `{topic}`,
/// `{questions}`, `{options}` and `{description}` placeholders.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub lesson_template: String,
  pub illustration_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_template: concat!(
        "Create a beginner-level language lesson for learning {language}.\n",
        "The topic is \"{topic}\".\n",
        "Generate {questions} multiple-choice questions.\n",
        "For each question:\n",
        "1. \"questionText\": The question the user needs to answer (e.g., \"How do you say 'Cat'?\").\n",
        "2. \"options\": {options} possible answers.\n",
        "3. \"correctAnswerIndex\": The zero-based index of the correct answer.\n",
        "4. \"imageDescription\": A simple, vivid description of an object or scene that represents the word or concept, suitable for a cartoon style illustration (e.g. \"A cute orange cat sitting on a mat\").\n",
        "5. \"explanation\": A brief explanation of why the answer is correct.\n",
      )
      .into(),
      illustration_template: "A flat vector art style, vibrant colors, cute cartoon illustration of {description}. White background. Minimalist design similar to modern language learning apps.".into(),
    }
  }
}

impl LessonConfig {
  /// Clamp nonsensical values back to something playable.
  fn sanitized(mut self) -> Self {
    if self.max_hearts == 0 {
      self.max_hearts = MAX_HEARTS;
    }
    if self.questions_per_lesson == 0 {
      self.questions_per_lesson = 4;
    }
    self.options_per_question = self.options_per_question.max(2);
    if self.topics.is_empty() {
      self.topics = default_topics();
    }
    if self.languages.is_empty() {
      self.languages = default_languages();
    }
    self
  }

  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str::<LessonConfig>(s).map(LessonConfig::sanitized)
  }
}

/// Load `LessonConfig` from LESSON_CONFIG_PATH. Missing variable or any parsing/IO error
/// falls back to defaults.
pub fn load_lesson_config_from_env() -> LessonConfig {
  let Ok(path) = std::env::var("LESSON_CONFIG_PATH") else {
    return LessonConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match LessonConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "lingoai_backend", %path, topics = cfg.topics.len(), languages = cfg.languages.len(), "Loaded lesson config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "lingoai_backend", %path, error = %e, "Failed to parse TOML config");
        LessonConfig::default()
      }
    },
    Err(e) => {
      error!(target: "lingoai_backend", %path, error = %e, "Failed to read TOML config file");
      LessonConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_yields_defaults() {
    let cfg = LessonConfig::from_toml_str("").expect("parse");
    assert_eq!(cfg.max_hearts, 5);
    assert_eq!(cfg.questions_per_lesson, 4);
    assert_eq!(cfg.topics.len(), 8);
    assert_eq!(cfg.languages.len(), 8);
    assert!(cfg.prompts.lesson_template.contains("{topic}"));
  }

  #[test]
  fn overrides_are_applied_and_sanitized() {
    let cfg = LessonConfig::from_toml_str(
      r#"
        max_hearts = 0
        questions_per_lesson = 6
        options_per_question = 1
        topics = ["Numbers", "Colors"]

        [prompts]
        illustration_template = "Sketch of {description}"

        [[languages]]
        code = "nl"
        name = "Dutch"
        flag = "NL"
      "#,
    )
    .expect("parse");
    assert_eq!(cfg.max_hearts, 5);
    assert_eq!(cfg.questions_per_lesson, 6);
    assert_eq!(cfg.options_per_question, 2);
    assert_eq!(cfg.topics, ["Numbers", "Colors"]);
    assert_eq!(cfg.languages[0].name, "Dutch");
    assert_eq!(cfg.prompts.illustration_template, "Sketch of {description}");
    assert!(cfg.prompts.lesson_template.contains("{language}"), "unset prompts keep defaults");
  }

  #[test]
  fn invalid_toml_is_an_error() {
    assert!(LessonConfig::from_toml_str("max_hearts = \"lots\"").is_err());
  }
}
