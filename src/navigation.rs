//! Screen/navigation controller.
//!
//! Routes a learner between the welcome, map, lesson and success screens, owns the live
//! lesson session and folds its outcome into the injected `LearnerProgress`.
//!
//! Illustrations are fetched asynchronously outside the controller. Every fetch carries an
//! `IllustrationToken`; the epoch behind it moves forward whenever the current question
//! changes or the lesson ends, and only a result carrying the current epoch is applied.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{ImageHandle, LessonContent};
use crate::progress::{LearnerProgress, ProgressError, TopicStatus};
use crate::session::{AnswerStatus, LessonError, LessonSession, SessionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
  Welcome,
  Map,
  Lesson,
  Success,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
  #[error("action not available on the {0:?} screen")]
  WrongScreen(Screen),
  #[error("no target language selected")]
  NoLanguage,
  #[error("unknown topic: {0}")]
  UnknownTopic(String),
  #[error("topic is locked: {0}")]
  TopicLocked(String),
  #[error(transparent)]
  Lesson(#[from] LessonError),
  #[error(transparent)]
  Progress(#[from] ProgressError),
}

/// Identifies which question an illustration fetch was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IllustrationToken(u64);

/// Work order for the illustration fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllustrationRequest {
  pub token: IllustrationToken,
  pub description: String,
}

/// Display state of the current question's illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "image", rename_all = "snake_case")]
pub enum Illustration {
  /// The question has no image description.
  None,
  Loading,
  Ready(ImageHandle),
  /// Fetch finished without an image.
  Placeholder,
}

/// Ticket handed out by `begin_lesson`; the caller fetches content and returns it with
/// `enter_lesson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRequest {
  pub language: String,
  pub topic: String,
}

/// What happened after `continue_lesson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonStep {
  NextQuestion(Option<IllustrationRequest>),
  Completed { xp: u32 },
  Exhausted,
}

#[derive(Debug)]
struct ActiveLesson {
  topic: String,
  session: LessonSession,
  illustration: Illustration,
}

#[derive(Debug)]
pub struct Navigator {
  screen: Screen,
  progress: LearnerProgress,
  topics: Vec<String>,
  lesson: Option<ActiveLesson>,
  illustration_epoch: u64,
  last_xp_earned: Option<u32>,
}

impl Navigator {
  pub fn new(progress: LearnerProgress, topics: Vec<String>) -> Self {
    Self {
      screen: Screen::Welcome,
      progress,
      topics,
      lesson: None,
      illustration_epoch: 0,
      last_xp_earned: None,
    }
  }

  pub fn screen(&self) -> Screen {
    self.screen
  }

  pub fn progress(&self) -> &LearnerProgress {
    &self.progress
  }

  pub fn topics(&self) -> &[String] {
    &self.topics
  }

  pub fn session(&self) -> Option<&LessonSession> {
    self.lesson.as_ref().map(|l| &l.session)
  }

  pub fn lesson_topic(&self) -> Option<&str> {
    self.lesson.as_ref().map(|l| l.topic.as_str())
  }

  pub fn illustration(&self) -> Option<&Illustration> {
    self.lesson.as_ref().map(|l| &l.illustration)
  }

  pub fn last_xp_earned(&self) -> Option<u32> {
    self.last_xp_earned
  }

  #[cfg(test)]
  pub(crate) fn force_screen(&mut self, screen: Screen) {
    self.screen = screen;
  }

  fn expect_screen(&self, screen: Screen) -> Result<(), NavigationError> {
    if self.screen == screen { Ok(()) } else { Err(NavigationError::WrongScreen(self.screen)) }
  }

  fn active_mut(&mut self) -> Result<&mut ActiveLesson, NavigationError> {
    if self.screen != Screen::Lesson {
      return Err(NavigationError::WrongScreen(self.screen));
    }
    self.lesson.as_mut().ok_or(NavigationError::Lesson(LessonError::NoActiveLesson))
  }

  /// Welcome → Map. Also usable from the map to switch languages.
  pub fn choose_language(&mut self, name: &str) -> Result<(), NavigationError> {
    if !matches!(self.screen, Screen::Welcome | Screen::Map) {
      return Err(NavigationError::WrongScreen(self.screen));
    }
    self.progress.select_language(name);
    self.screen = Screen::Map;
    Ok(())
  }

  /// Validate a topic pick on the map. The screen does not change until `enter_lesson`.
  pub fn begin_lesson(&self, topic: &str) -> Result<LessonRequest, NavigationError> {
    self.expect_screen(Screen::Map)?;
    let language = self.progress.target_language().ok_or(NavigationError::NoLanguage)?.to_string();

    let node = self
      .progress
      .topic_path(&self.topics)
      .into_iter()
      .find(|n| n.topic == topic)
      .ok_or_else(|| NavigationError::UnknownTopic(topic.to_string()))?;
    if node.status == TopicStatus::Locked {
      return Err(NavigationError::TopicLocked(topic.to_string()));
    }

    Ok(LessonRequest { language, topic: node.topic })
  }

  /// Map → Lesson with freshly fetched content. Returns the first illustration to fetch.
  pub fn enter_lesson(
    &mut self,
    request: LessonRequest,
    content: LessonContent,
  ) -> Result<Option<IllustrationRequest>, NavigationError> {
    self.expect_screen(Screen::Map)?;
    let session = LessonSession::initialize(content, self.progress.hearts())?;
    info!(
      target: "lesson",
      topic = %request.topic,
      language = %request.language,
      title = %session.content().title,
      questions = session.question_count(),
      source = ?session.content().source,
      "Lesson started"
    );

    self.lesson = Some(ActiveLesson { topic: request.topic, session, illustration: Illustration::None });
    self.last_xp_earned = None;
    self.screen = Screen::Lesson;
    Ok(self.refresh_illustration())
  }

  pub fn select_option(&mut self, index: usize) -> Result<(), NavigationError> {
    self.active_mut()?.session.select_option(index)?;
    Ok(())
  }

  /// Check the current answer and mirror hearts into progress.
  pub fn check_answer(&mut self) -> Result<AnswerStatus, NavigationError> {
    let active = self.active_mut()?;
    let status = active.session.check()?;
    let hearts = active.session.state().hearts_remaining;
    self.progress.set_hearts(hearts)?;
    Ok(status)
  }

  /// Advance past the checked question and apply terminal outcomes.
  pub fn continue_lesson(&mut self) -> Result<LessonStep, NavigationError> {
    let outcome = self.active_mut()?.session.advance()?;
    match outcome {
      SessionOutcome::Continuing(state) => {
        debug!(target: "lesson", index = state.current_index, "Next question");
        Ok(LessonStep::NextQuestion(self.refresh_illustration()))
      }
      SessionOutcome::Completed { xp } => {
        let lesson_id = self.progress.next_lesson_id();
        self.progress.apply_completion(xp, lesson_id);
        self.finish_lesson(Screen::Success);
        self.last_xp_earned = Some(xp);
        Ok(LessonStep::Completed { xp })
      }
      SessionOutcome::Exhausted => {
        info!(target: "lesson", "Out of hearts; returning to map");
        self.progress.apply_exhaustion_reset();
        self.finish_lesson(Screen::Map);
        Ok(LessonStep::Exhausted)
      }
    }
  }

  /// Leave the lesson early. Hearts are refilled; nothing is recorded.
  pub fn exit_lesson(&mut self) -> Result<(), NavigationError> {
    self.active_mut()?;
    info!(target: "lesson", topic = ?self.lesson_topic(), "Lesson exited");
    self.progress.apply_exhaustion_reset();
    self.finish_lesson(Screen::Map);
    Ok(())
  }

  /// Success → Map.
  pub fn continue_to_map(&mut self) -> Result<(), NavigationError> {
    self.expect_screen(Screen::Success)?;
    self.screen = Screen::Map;
    Ok(())
  }

  /// Apply a finished illustration fetch. Returns false (and drops the result) when the
  /// token no longer matches the current question.
  pub fn apply_illustration(&mut self, token: IllustrationToken, image: Option<ImageHandle>) -> bool {
    let current = token.0 == self.illustration_epoch;
    match self.lesson.as_mut() {
      Some(active) if current && active.illustration == Illustration::Loading => {
        active.illustration = match image {
          Some(img) => Illustration::Ready(img),
          None => Illustration::Placeholder,
        };
        true
      }
      _ => {
        debug!(target: "lesson", token = token.0, epoch = self.illustration_epoch, "Dropping stale illustration");
        false
      }
    }
  }

  fn finish_lesson(&mut self, next: Screen) {
    self.lesson = None;
    self.illustration_epoch += 1;
    self.screen = next;
  }

  /// New current question: bump the epoch and decide whether a fetch is needed.
  fn refresh_illustration(&mut self) -> Option<IllustrationRequest> {
    self.illustration_epoch += 1;
    let token = IllustrationToken(self.illustration_epoch);
    let active = self.lesson.as_mut()?;
    let description = active.session.current_question().image_description.trim().to_string();
    if description.is_empty() {
      active.illustration = Illustration::None;
      return None;
    }
    active.illustration = Illustration::Loading;
    Some(IllustrationRequest { token, description })
  }
}
