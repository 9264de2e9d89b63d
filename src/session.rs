//! Lesson session engine: one attempt through a lesson's questions.
//!
//! The engine is synchronous and performs no I/O. It tracks the current question,
//! the pending selection, the answer status and the hearts left for this attempt.
//! Callers mirror `hearts_remaining` into the learner's progress after every check.
//!
//! ```text
//! Unanswered --select_option--> Unanswered (selection set)
//! Unanswered --check(correct)--> Correct
//! Unanswered --check(incorrect)--> Incorrect (hearts -1)
//! {Correct,Incorrect} --advance, hearts==0--> Exhausted [terminal]
//! {Correct,Incorrect} --advance, last question--> Completed(xp) [terminal]
//! {Correct,Incorrect} --advance, else--> Unanswered (next question)
//! ```

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{LessonContent, Question};

/// Flat reward for finishing a lesson.
pub const BASE_XP: u32 = 10;
/// Added per question in the lesson, regardless of how many were answered correctly.
pub const XP_PER_QUESTION: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
  #[error("lesson content is invalid: {0}")]
  InvalidContent(String),

  #[error("no option selected")]
  NoSelection,

  #[error("option {index} is out of range ({len} options)")]
  OptionOutOfRange { index: usize, len: usize },

  #[error("question already answered")]
  AlreadyAnswered,

  #[error("question not answered yet")]
  NotAnswered,

  #[error("no lesson in progress")]
  NoActiveLesson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
  Unanswered,
  Correct,
  Incorrect,
}

/// Mutable part of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionState {
  pub current_index: usize,
  pub selected_option: Option<usize>,
  pub answer_status: AnswerStatus,
  pub hearts_remaining: u8,
}

/// Result of `LessonSession::advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
  /// Moved to the next question.
  Continuing(SessionState),
  /// Last question answered with hearts left.
  Completed { xp: u32 },
  /// Out of hearts; no further questions are shown.
  Exhausted,
}

/// XP awarded for completing a lesson of `question_count` questions.
pub fn completion_xp(question_count: usize) -> u32 {
  let n = u32::try_from(question_count).unwrap_or(u32::MAX);
  BASE_XP.saturating_add(n.saturating_mul(XP_PER_QUESTION))
}

/// One lesson attempt. Owns the lesson content for its lifetime.
#[derive(Debug, Clone)]
pub struct LessonSession {
  content: LessonContent,
  state: SessionState,
}

impl LessonSession {
  /// Start an attempt at the first question.
  ///
  /// # Errors
  ///
  /// Returns `LessonError::InvalidContent` if there are no questions or a question
  /// is structurally broken.
  pub fn initialize(content: LessonContent, starting_hearts: u8) -> Result<Self, LessonError> {
    if content.questions.is_empty() {
      return Err(LessonError::InvalidContent("lesson has no questions".into()));
    }
    if let Some(pos) = content.questions.iter().position(|q| !q.is_well_formed()) {
      return Err(LessonError::InvalidContent(format!("question {pos} is malformed")));
    }

    Ok(Self {
      content,
      state: SessionState {
        current_index: 0,
        selected_option: None,
        answer_status: AnswerStatus::Unanswered,
        hearts_remaining: starting_hearts,
      },
    })
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn content(&self) -> &LessonContent {
    &self.content
  }

  pub fn question_count(&self) -> usize {
    self.content.questions.len()
  }

  pub fn current_question(&self) -> &Question {
    &self.content.questions[self.state.current_index]
  }

  pub fn is_last_question(&self) -> bool {
    self.state.current_index + 1 == self.content.questions.len()
  }

  /// Choose an option for the current question. Re-selecting overwrites.
  ///
  /// # Errors
  ///
  /// `AlreadyAnswered` once checked, `OptionOutOfRange` for a bad index.
  pub fn select_option(&mut self, index: usize) -> Result<SessionState, LessonError> {
    if self.state.answer_status != AnswerStatus::Unanswered {
      return Err(LessonError::AlreadyAnswered);
    }
    let len = self.current_question().options.len();
    if index >= len {
      return Err(LessonError::OptionOutOfRange { index, len });
    }
    self.state.selected_option = Some(index);
    Ok(self.state)
  }

  /// Evaluate the selected option. A wrong answer costs one heart (floored at zero).
  ///
  /// # Errors
  ///
  /// `NoSelection` when nothing is selected, `AlreadyAnswered` when checked twice.
  pub fn check(&mut self) -> Result<AnswerStatus, LessonError> {
    if self.state.answer_status != AnswerStatus::Unanswered {
      return Err(LessonError::AlreadyAnswered);
    }
    let selected = self.state.selected_option.ok_or(LessonError::NoSelection)?;

    let status = if selected == self.current_question().correct_answer_index {
      AnswerStatus::Correct
    } else {
      self.state.hearts_remaining = self.state.hearts_remaining.saturating_sub(1);
      AnswerStatus::Incorrect
    };
    self.state.answer_status = status;
    debug!(target: "lesson", index = self.state.current_index, selected, ?status, hearts = self.state.hearts_remaining, "Answer checked");
    Ok(status)
  }

  /// Move past an answered question.
  ///
  /// # Errors
  ///
  /// `NotAnswered` while the current question is unanswered.
  pub fn advance(&mut self) -> Result<SessionOutcome, LessonError> {
    if self.state.answer_status == AnswerStatus::Unanswered {
      return Err(LessonError::NotAnswered);
    }
    if self.state.hearts_remaining == 0 {
      return Ok(SessionOutcome::Exhausted);
    }
    if self.is_last_question() {
      return Ok(SessionOutcome::Completed { xp: completion_xp(self.question_count()) });
    }

    self.state.current_index += 1;
    self.state.selected_option = None;
    self.state.answer_status = AnswerStatus::Unanswered;
    Ok(SessionOutcome::Continuing(self.state))
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::domain::ContentSource;

  /// Lesson of `n` questions whose correct answer is always option 0.
  pub(crate) fn lesson(n: usize) -> LessonContent {
    LessonContent {
      title: "Basics 1".into(),
      questions: (0..n)
        .map(|i| Question {
          question_text: format!("Question {}", i + 1),
          options: vec!["right".into(), "wrong".into(), "also wrong".into(), "nope".into()],
          correct_answer_index: 0,
          image_description: format!("picture {}", i + 1),
          explanation: "Because.".into(),
        })
        .collect(),
      source: ContentSource::Generated,
    }
  }

  fn answer(s: &mut LessonSession, option: usize) -> AnswerStatus {
    s.select_option(option).expect("select");
    s.check().expect("check")
  }

  #[test]
  fn initialize_starts_at_first_question() {
    let s = LessonSession::initialize(lesson(3), 5).expect("init");
    let st = s.state();
    assert_eq!(st.current_index, 0);
    assert_eq!(st.answer_status, AnswerStatus::Unanswered);
    assert_eq!(st.selected_option, None);
    assert_eq!(st.hearts_remaining, 5);
  }

  #[test]
  fn initialize_rejects_empty_lesson() {
    let err = LessonSession::initialize(lesson(0), 5).unwrap_err();
    assert!(matches!(err, LessonError::InvalidContent(_)));
  }

  #[test]
  fn initialize_rejects_malformed_question() {
    let mut content = lesson(2);
    content.questions[1].correct_answer_index = 9;
    assert!(matches!(LessonSession::initialize(content, 5), Err(LessonError::InvalidContent(_))));
  }

  #[test]
  fn select_option_validates_range_and_overwrites() {
    let mut s = LessonSession::initialize(lesson(1), 5).expect("init");
    assert_eq!(s.select_option(4), Err(LessonError::OptionOutOfRange { index: 4, len: 4 }));
    s.select_option(1).expect("select");
    s.select_option(2).expect("reselect");
    assert_eq!(s.state().selected_option, Some(2));
  }

  #[test]
  fn check_requires_selection() {
    let mut s = LessonSession::initialize(lesson(1), 5).expect("init");
    assert_eq!(s.check(), Err(LessonError::NoSelection));
    assert_eq!(s.state().answer_status, AnswerStatus::Unanswered);
  }

  #[test]
  fn check_is_rejected_once_answered() {
    let mut s = LessonSession::initialize(lesson(1), 5).expect("init");
    answer(&mut s, 1);
    assert_eq!(s.check(), Err(LessonError::AlreadyAnswered));
    assert_eq!(s.select_option(0), Err(LessonError::AlreadyAnswered));
    assert_eq!(s.state().hearts_remaining, 4, "second check must not cost another heart");
  }

  #[test]
  fn correct_answer_keeps_hearts() {
    let mut s = LessonSession::initialize(lesson(2), 3).expect("init");
    assert_eq!(answer(&mut s, 0), AnswerStatus::Correct);
    assert_eq!(s.state().hearts_remaining, 3);
  }

  #[test]
  fn incorrect_answer_costs_one_heart_floored_at_zero() {
    let mut s = LessonSession::initialize(lesson(2), 0).expect("init");
    assert_eq!(answer(&mut s, 3), AnswerStatus::Incorrect);
    assert_eq!(s.state().hearts_remaining, 0);
  }

  #[test]
  fn advance_requires_answer() {
    let mut s = LessonSession::initialize(lesson(2), 5).expect("init");
    assert_eq!(s.advance(), Err(LessonError::NotAnswered));
  }

  #[test]
  fn advance_moves_to_next_question_and_resets() {
    let mut s = LessonSession::initialize(lesson(3), 5).expect("init");
    answer(&mut s, 1);
    match s.advance().expect("advance") {
      SessionOutcome::Continuing(st) => {
        assert_eq!(st.current_index, 1);
        assert_eq!(st.selected_option, None);
        assert_eq!(st.answer_status, AnswerStatus::Unanswered);
        assert_eq!(st.hearts_remaining, 4);
      }
      other => panic!("expected Continuing, got {other:?}"),
    }
  }

  #[test]
  fn exhausted_takes_precedence_over_remaining_questions() {
    let mut s = LessonSession::initialize(lesson(4), 1).expect("init");
    answer(&mut s, 2);
    assert_eq!(s.advance(), Ok(SessionOutcome::Exhausted));
  }

  // Completion pays out for finishing, independent of accuracy.
  #[test]
  fn completion_xp_ignores_accuracy() {
    assert_eq!(completion_xp(4), 30);
    assert_eq!(completion_xp(1), 15);

    let mut s = LessonSession::initialize(lesson(2), 5).expect("init");
    answer(&mut s, 1);
    s.advance().expect("advance");
    answer(&mut s, 1);
    assert_eq!(s.advance(), Ok(SessionOutcome::Completed { xp: 20 }));
  }

  #[test]
  fn four_question_scenario() {
    let mut s = LessonSession::initialize(lesson(4), 5).expect("init");

    assert_eq!(answer(&mut s, 0), AnswerStatus::Correct);
    assert!(matches!(s.advance().expect("q1"), SessionOutcome::Continuing(_)));

    assert_eq!(answer(&mut s, 1), AnswerStatus::Incorrect);
    assert_eq!(s.state().hearts_remaining, 4);
    s.advance().expect("q2");

    assert_eq!(answer(&mut s, 2), AnswerStatus::Incorrect);
    assert_eq!(s.state().hearts_remaining, 3);
    s.advance().expect("q3");

    assert_eq!(answer(&mut s, 0), AnswerStatus::Correct);
    assert_eq!(s.advance(), Ok(SessionOutcome::Completed { xp: 30 }));
  }

  #[test]
  fn single_wrong_answer_with_one_heart_exhausts() {
    let mut s = LessonSession::initialize(lesson(1), 1).expect("init");
    assert_eq!(answer(&mut s, 1), AnswerStatus::Incorrect);
    assert_eq!(s.state().hearts_remaining, 0);
    assert_eq!(s.advance(), Ok(SessionOutcome::Exhausted));
  }
}
