//! Learner progress: language choice, hearts, XP and completed lessons.
//!
//! Lives for the lifetime of a learner connection; nothing is persisted.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Default heart budget.
pub const MAX_HEARTS: u8 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
  #[error("hearts value {hearts} is outside 0..={max}")]
  HeartsOutOfRange { hearts: u8, max: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
  Completed,
  Current,
  Locked,
}

/// One node of the lesson path shown on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicNode {
  pub topic: String,
  pub status: TopicStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnerProgress {
  target_language: Option<String>,
  hearts: u8,
  max_hearts: u8,
  xp: u32,
  completed_lesson_ids: Vec<String>,
}

impl Default for LearnerProgress {
  fn default() -> Self {
    Self::new(MAX_HEARTS)
  }
}

impl LearnerProgress {
  /// Fresh progress with full hearts.
  pub fn new(max_hearts: u8) -> Self {
    Self {
      target_language: None,
      hearts: max_hearts,
      max_hearts,
      xp: 0,
      completed_lesson_ids: Vec::new(),
    }
  }

  pub fn target_language(&self) -> Option<&str> {
    self.target_language.as_deref()
  }

  pub fn hearts(&self) -> u8 {
    self.hearts
  }

  pub fn max_hearts(&self) -> u8 {
    self.max_hearts
  }

  pub fn xp(&self) -> u32 {
    self.xp
  }

  pub fn completed_lesson_ids(&self) -> &[String] {
    &self.completed_lesson_ids
  }

  pub fn select_language(&mut self, name: impl Into<String>) {
    let name = name.into();
    info!(target: "lesson", language = %name, "Target language selected");
    self.target_language = Some(name);
  }

  /// Positional id for the next completion: the Nth completion is `lesson-N`.
  pub fn next_lesson_id(&self) -> String {
    format!("lesson-{}", self.completed_lesson_ids.len() + 1)
  }

  /// Award XP, record the lesson and refill hearts.
  pub fn apply_completion(&mut self, xp_earned: u32, lesson_id: impl Into<String>) {
    let lesson_id = lesson_id.into();
    self.xp = self.xp.saturating_add(xp_earned);
    info!(target: "lesson", %lesson_id, xp_earned, total_xp = self.xp, "Lesson completed");
    self.completed_lesson_ids.push(lesson_id);
    self.hearts = self.max_hearts;
  }

  /// Refill hearts after running out or leaving a lesson. No XP, no record.
  pub fn apply_exhaustion_reset(&mut self) {
    self.hearts = self.max_hearts;
  }

  /// Mirror the live session's hearts.
  ///
  /// # Errors
  ///
  /// Returns `ProgressError::HeartsOutOfRange` when `hearts` exceeds the maximum.
  pub fn set_hearts(&mut self, hearts: u8) -> Result<(), ProgressError> {
    if hearts > self.max_hearts {
      return Err(ProgressError::HeartsOutOfRange { hearts, max: self.max_hearts });
    }
    self.hearts = hearts;
    Ok(())
  }

  /// Lesson path: topics before the completion count are done, the next one is open,
  /// the rest are locked.
  pub fn topic_path(&self, topics: &[String]) -> Vec<TopicNode> {
    let done = self.completed_lesson_ids.len();
    topics
      .iter()
      .enumerate()
      .map(|(i, topic)| TopicNode {
        topic: topic.clone(),
        status: if i < done {
          TopicStatus::Completed
        } else if i == done {
          TopicStatus::Current
        } else {
          TopicStatus::Locked
        },
      })
      .collect()
  }
}
