//! Core behaviors shared by the WebSocket loop and the HTTP handlers.
//!
//! This includes:
//!   - Applying one client action to a learner's navigator
//!   - Fetching lesson content through the provider (fail-open), after the caller has
//!     already delivered the `lesson_loading` reply
//!   - Producing the illustration work that the caller must run asynchronously

use tracing::{debug, info, instrument, warn};

use crate::navigation::{IllustrationRequest, LessonRequest, LessonStep, NavigationError, Navigator};
use crate::protocol::{view_of, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

/// Replies for one client action plus any follow-up work it triggered.
///
/// `pending_lesson` is set when a topic pick was accepted: the replies must be sent
/// before the caller runs `load_lesson` with it.
#[derive(Debug, Default)]
pub struct Dispatch {
  pub replies: Vec<ServerWsMessage>,
  pub illustration: Option<IllustrationRequest>,
  pub pending_lesson: Option<LessonRequest>,
}

impl Dispatch {
  fn reply(msg: ServerWsMessage) -> Self {
    Self { replies: vec![msg], ..Self::default() }
  }

  fn state(state: &AppState, nav: &Navigator) -> Self {
    Self::reply(ServerWsMessage::State { view: view_of(nav, &state.config) })
  }

  fn error(e: NavigationError) -> Self {
    Self::reply(ServerWsMessage::Error { message: e.to_string() })
  }
}

/// Apply one client message. Actions are processed one at a time per learner.
#[instrument(level = "info", skip(state, nav), fields(screen = ?nav.screen()))]
pub async fn dispatch(state: &AppState, nav: &mut Navigator, msg: ClientWsMessage) -> Dispatch {
  let result = match msg {
    ClientWsMessage::Ping => return Dispatch::reply(ServerWsMessage::Pong),
    ClientWsMessage::GetState => Ok(None),
    ClientWsMessage::SelectLanguage { language } => nav.choose_language(&language).map(|_| None),
    ClientWsMessage::StartLesson { topic } => return start_lesson(nav, &topic),
    ClientWsMessage::SelectOption { index } => nav.select_option(index).map(|_| None),
    ClientWsMessage::Check => nav.check_answer().map(|status| {
      debug!(target: "lesson", ?status, hearts = nav.progress().hearts(), "WS check");
      None
    }),
    ClientWsMessage::Continue => continue_action(nav),
    ClientWsMessage::ExitLesson => nav.exit_lesson().map(|_| None),
  };

  match result {
    Ok(illustration) => {
      let mut d = Dispatch::state(state, nav);
      d.illustration = illustration;
      d
    }
    Err(e) => {
      warn!(target: "lesson", error = %e, "Action rejected");
      Dispatch::error(e)
    }
  }
}

/// The single "continue" button: next question inside a lesson, back to the map on success.
fn continue_action(nav: &mut Navigator) -> Result<Option<IllustrationRequest>, NavigationError> {
  if nav.screen() == crate::navigation::Screen::Success {
    nav.continue_to_map()?;
    return Ok(None);
  }
  match nav.continue_lesson()? {
    LessonStep::NextQuestion(req) => Ok(req),
    LessonStep::Completed { xp } => {
      info!(target: "lesson", xp, total_xp = nav.progress().xp(), "WS lesson completed");
      Ok(None)
    }
    LessonStep::Exhausted => Ok(None),
  }
}

/// Map pick: validate the topic and hand back the fetch to run once `lesson_loading` is out.
fn start_lesson(nav: &Navigator, topic: &str) -> Dispatch {
  match nav.begin_lesson(topic) {
    Ok(request) => {
      debug!(target: "lesson", topic = %request.topic, language = %request.language, "Lesson requested");
      Dispatch {
        replies: vec![ServerWsMessage::LessonLoading { topic: request.topic.clone() }],
        pending_lesson: Some(request),
        ..Dispatch::default()
      }
    }
    Err(e) => {
      warn!(target: "lesson", error = %e, "Action rejected");
      Dispatch::error(e)
    }
  }
}

/// Map → Lesson: fetch content (never fails) and enter the lesson.
#[instrument(level = "info", skip(state, nav, request), fields(topic = %request.topic))]
pub async fn load_lesson(state: &AppState, nav: &mut Navigator, request: LessonRequest) -> Dispatch {
  let content = state.provider.fetch_lesson(&request.language, &request.topic).await;

  match nav.enter_lesson(request, content) {
    Ok(illustration) => {
      let mut d = Dispatch::state(state, nav);
      d.illustration = illustration;
      d
    }
    Err(e) => {
      warn!(target: "lesson", error = %e, "Provider returned unplayable content");
      Dispatch::error(e)
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  use async_trait::async_trait;
  use tokio::sync::Notify;

  use super::*;
  use crate::config::LessonConfig;
  use crate::domain::{ImageHandle, LessonContent};
  use crate::navigation::Screen;
  use crate::provider::ContentProvider;
  use crate::session::tests::lesson;

  struct StubProvider {
    questions: usize,
    fetches: AtomicUsize,
  }

  #[async_trait]
  impl ContentProvider for StubProvider {
    async fn fetch_lesson(&self, _language: &str, _topic: &str) -> LessonContent {
      self.fetches.fetch_add(1, Ordering::SeqCst);
      lesson(self.questions)
    }

    async fn fetch_illustration(&self, _description: &str) -> Option<ImageHandle> {
      ImageHandle::from_inline("image/png", "aGVsbG8=")
    }
  }

  fn app(questions: usize) -> (AppState, Arc<StubProvider>) {
    let provider = Arc::new(StubProvider { questions, fetches: AtomicUsize::new(0) });
    (AppState::with_provider(LessonConfig::default(), provider.clone()), provider)
  }

  fn last_json(d: &Dispatch) -> serde_json::Value {
    serde_json::to_value(d.replies.last().expect("reply")).expect("json")
  }

  /// Same sequence as the socket loop: early replies first, then any pending lesson load.
  async fn send(state: &AppState, nav: &mut Navigator, raw: &str) -> Dispatch {
    let msg: ClientWsMessage = serde_json::from_str(raw).expect("client message");
    let mut d = dispatch(state, nav, msg).await;
    if let Some(request) = d.pending_lesson.take() {
      let loaded = load_lesson(state, nav, request).await;
      d.replies.extend(loaded.replies);
      d.illustration = loaded.illustration;
    }
    d
  }

  #[tokio::test]
  async fn full_lesson_flow() {
    let (state, provider) = app(2);
    let mut nav = state.new_navigator();

    let d = send(&state, &mut nav, r#"{"type":"get_state"}"#).await;
    assert_eq!(last_json(&d)["view"]["screen"], "welcome");

    send(&state, &mut nav, r#"{"type":"select_language","language":"Italian"}"#).await;
    assert_eq!(nav.screen(), Screen::Map);

    let d = send(&state, &mut nav, r#"{"type":"start_lesson","topic":"Basics 1"}"#).await;
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(serde_json::to_value(&d.replies[0]).expect("json")["type"], "lesson_loading");
    assert_eq!(last_json(&d)["view"]["screen"], "lesson");
    let first = d.illustration.expect("illustration request");

    send(&state, &mut nav, r#"{"type":"select_option","index":1}"#).await;
    let d = send(&state, &mut nav, r#"{"type":"check"}"#).await;
    assert_eq!(last_json(&d)["view"]["answer_status"], "incorrect");
    assert_eq!(nav.progress().hearts(), 4);

    let d = send(&state, &mut nav, r#"{"type":"continue"}"#).await;
    let second = d.illustration.expect("second illustration");
    assert_ne!(first.token, second.token);
    assert!(!nav.apply_illustration(first.token, None));

    send(&state, &mut nav, r#"{"type":"select_option","index":0}"#).await;
    send(&state, &mut nav, r#"{"type":"check"}"#).await;
    let d = send(&state, &mut nav, r#"{"type":"continue"}"#).await;
    let view = &last_json(&d)["view"];
    assert_eq!(view["screen"], "success");
    assert_eq!(view["xp_earned"], 20);
    assert_eq!(view["total_xp"], 20);
    assert_eq!(nav.progress().hearts(), 5);

    let d = send(&state, &mut nav, r#"{"type":"continue"}"#).await;
    let view = &last_json(&d)["view"];
    assert_eq!(view["screen"], "map");
    assert_eq!(view["path"][0]["status"], "completed");
    assert_eq!(view["path"][1]["status"], "current");
  }

  #[tokio::test]
  async fn check_without_selection_is_reported_and_recoverable() {
    let (state, _) = app(1);
    let mut nav = state.new_navigator();
    send(&state, &mut nav, r#"{"type":"select_language","language":"Korean"}"#).await;
    send(&state, &mut nav, r#"{"type":"start_lesson","topic":"Basics 1"}"#).await;

    let d = send(&state, &mut nav, r#"{"type":"check"}"#).await;
    let json = last_json(&d);
    assert_eq!(json["type"], "error");
    assert_eq!(json["message"], "no option selected");
    assert_eq!(nav.screen(), Screen::Lesson);

    send(&state, &mut nav, r#"{"type":"select_option","index":0}"#).await;
    let d = send(&state, &mut nav, r#"{"type":"check"}"#).await;
    assert_eq!(last_json(&d)["view"]["answer_status"], "correct");
  }

  #[tokio::test]
  async fn locked_topic_does_not_fetch() {
    let (state, provider) = app(1);
    let mut nav = state.new_navigator();
    send(&state, &mut nav, r#"{"type":"select_language","language":"Korean"}"#).await;
    let d = send(&state, &mut nav, r#"{"type":"start_lesson","topic":"School"}"#).await;
    assert_eq!(last_json(&d)["type"], "error");
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
  }

  /// Holds every lesson fetch until the gate is opened.
  struct GatedProvider {
    gate: Notify,
    fetches: AtomicUsize,
  }

  #[async_trait]
  impl ContentProvider for GatedProvider {
    async fn fetch_lesson(&self, _language: &str, _topic: &str) -> LessonContent {
      self.fetches.fetch_add(1, Ordering::SeqCst);
      self.gate.notified().await;
      lesson(3)
    }

    async fn fetch_illustration(&self, _description: &str) -> Option<ImageHandle> {
      None
    }
  }

  #[tokio::test]
  async fn lesson_loading_is_replied_before_the_fetch_starts() {
    let provider = Arc::new(GatedProvider { gate: Notify::new(), fetches: AtomicUsize::new(0) });
    let state = AppState::with_provider(LessonConfig::default(), provider.clone());
    let mut nav = state.new_navigator();
    send(&state, &mut nav, r#"{"type":"select_language","language":"French"}"#).await;

    // The gate is still closed: this only returns if dispatch does not wait on generation.
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"start_lesson","topic":"Basics 1"}"#).expect("msg");
    let mut d = dispatch(&state, &mut nav, msg).await;
    assert_eq!(d.replies.len(), 1);
    let json = serde_json::to_value(&d.replies[0]).expect("json");
    assert_eq!(json["type"], "lesson_loading");
    assert_eq!(json["topic"], "Basics 1");
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(nav.screen(), Screen::Map);

    let request = d.pending_lesson.take().expect("pending lesson");
    provider.gate.notify_one();
    let loaded = load_lesson(&state, &mut nav, request).await;
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(last_json(&loaded)["view"]["screen"], "lesson");
    assert_eq!(last_json(&loaded)["view"]["question_count"], 3);
  }

  #[tokio::test]
  async fn rejected_pick_leaves_nothing_pending() {
    let (state, _) = app(1);
    let mut nav = state.new_navigator();
    send(&state, &mut nav, r#"{"type":"select_language","language":"Korean"}"#).await;
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"start_lesson","topic":"Nowhere"}"#).expect("msg");
    let d = dispatch(&state, &mut nav, msg).await;
    assert!(d.pending_lesson.is_none());
    assert_eq!(last_json(&d)["type"], "error");
  }

  #[tokio::test]
  async fn ping_pongs_on_any_screen() {
    let (state, _) = app(1);
    let mut nav = state.new_navigator();
    let d = send(&state, &mut nav, r#"{"type":"ping"}"#).await;
    assert_eq!(last_json(&d)["type"], "pong");
  }
}
