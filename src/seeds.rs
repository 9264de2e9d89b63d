//! Seed data: default catalogue and the offline lesson.

use crate::domain::{ContentSource, LanguageOption, LessonContent, Question};

/// Languages offered on the welcome screen unless overridden in TOML.
pub fn default_languages() -> Vec<LanguageOption> {
  [
    ("es", "Spanish", "🇪🇸"),
    ("fr", "French", "🇫🇷"),
    ("de", "German", "🇩🇪"),
    ("it", "Italian", "🇮🇹"),
    ("ja", "Japanese", "🇯🇵"),
    ("pt", "Portuguese", "🇧🇷"),
    ("zh", "Chinese", "🇨🇳"),
    ("ko", "Korean", "🇰🇷"),
  ]
  .into_iter()
  .map(|(code, name, flag)| LanguageOption { code: code.into(), name: name.into(), flag: flag.into() })
  .collect()
}

/// The lesson path, in unlock order.
pub fn default_topics() -> Vec<String> {
  ["Basics 1", "Greetings", "Travel", "Food", "Family", "Basics 2", "Shopping", "School"]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Absolute last resort: served whenever generation fails so a lesson can always start.
pub fn fallback_lesson() -> LessonContent {
  LessonContent {
    title: "Basics (Offline Mode)".into(),
    questions: vec![Question {
      question_text: "Select the correct translation for 'Hello'".into(),
      options: vec!["Hola".into(), "Adios".into(), "Gato".into(), "Perro".into()],
      correct_answer_index: 0,
      image_description: "Two friendly people waving at each other".into(),
      explanation: "Hola means Hello.".into(),
    }],
    source: ContentSource::Fallback,
  }
}
