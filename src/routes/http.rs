//! HTTP endpoint handlers. These are thin, stateless wrappers around the provider and
//! the configured catalogue. The stateful lesson flow lives on the WebSocket.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::protocol::*;
use crate::provider::sanitize_lesson;
use crate::seeds::fallback_lesson;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, online: state.provider_online() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(LanguagesOut { languages: state.config.languages.clone() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(TopicsOut { topics: state.config.topics.clone() })
}

#[instrument(level = "info", skip(state), fields(language = %q.language, topic = %q.topic))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LessonQuery>,
) -> impl IntoResponse {
  let content = state.provider.fetch_lesson(&q.language, &q.topic).await;
  // Providers promise playable content; guard anyway so clients never get an empty lesson.
  let content = sanitize_lesson(content).unwrap_or_else(fallback_lesson);
  info!(target: "lesson", language = %q.language, topic = %q.topic, questions = content.questions.len(), source = ?content.source, "HTTP lesson served");
  Json(LessonOut::from(content))
}

#[instrument(level = "info", skip(state, body), fields(desc_len = body.description.len()))]
pub async fn http_post_illustration(
  State(state): State<Arc<AppState>>,
  Json(body): Json<IllustrationIn>,
) -> impl IntoResponse {
  let description = body.description.trim();
  let image = if description.is_empty() { None } else { state.provider.fetch_illustration(description).await };
  info!(target: "lesson", has_image = image.is_some(), "HTTP illustration served");
  Json(IllustrationOut { image })
}
