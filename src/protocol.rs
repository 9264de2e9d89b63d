//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LessonConfig;
use crate::domain::{ContentSource, ImageHandle, LanguageOption, LessonContent, Question};
use crate::navigation::{Illustration, IllustrationToken, Navigator, Screen};
use crate::progress::TopicNode;
use crate::session::AnswerStatus;

/// Messages the client can send over WebSocket. One per button press.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    SelectLanguage {
        language: String,
    },
    StartLesson {
        topic: String,
    },
    SelectOption {
        index: usize,
    },
    Check,
    Continue,
    ExitLesson,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    LessonLoading {
        topic: String,
    },
    State {
        view: ScreenView,
    },
    Illustration {
        token: IllustrationToken,
        image: Option<ImageHandle>,
    },
    Error {
        message: String,
    },
}

/// Snapshot of what the current screen should show.
#[derive(Debug, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenView {
    Welcome {
        languages: Vec<LanguageOption>,
    },
    Map {
        language: Option<String>,
        hearts: u8,
        max_hearts: u8,
        xp: u32,
        completed_lessons: usize,
        path: Vec<TopicNode>,
    },
    Lesson(LessonView),
    Success {
        xp_earned: u32,
        total_xp: u32,
    },
}

/// Lesson screen. Answer details are only revealed once the question was checked.
#[derive(Debug, Serialize)]
pub struct LessonView {
    pub title: String,
    pub topic: String,
    pub source: ContentSource,
    pub question_index: usize,
    pub question_count: usize,
    pub progress_percent: f32,
    pub hearts: u8,
    pub question_text: String,
    pub options: Vec<String>,
    pub selected_option: Option<usize>,
    pub answer_status: AnswerStatus,
    pub correct_answer_index: Option<usize>,
    pub correct_option: Option<String>,
    pub explanation: Option<String>,
    pub illustration: Illustration,
}

/// Build the snapshot for the navigator's current screen.
pub fn view_of(nav: &Navigator, config: &LessonConfig) -> ScreenView {
    let progress = nav.progress();
    match nav.screen() {
        Screen::Welcome => ScreenView::Welcome { languages: config.languages.clone() },
        Screen::Map => map_view(nav),
        Screen::Success => ScreenView::Success {
            xp_earned: nav.last_xp_earned().unwrap_or_default(),
            total_xp: progress.xp(),
        },
        Screen::Lesson => match nav.session() {
            Some(session) => {
                let state = session.state();
                let q = session.current_question();
                let answered = state.answer_status != AnswerStatus::Unanswered;
                let count = session.question_count();
                ScreenView::Lesson(LessonView {
                    title: session.content().title.clone(),
                    topic: nav.lesson_topic().unwrap_or_default().to_string(),
                    source: session.content().source,
                    question_index: state.current_index,
                    question_count: count,
                    progress_percent: state.current_index as f32 / count as f32 * 100.0,
                    hearts: state.hearts_remaining,
                    question_text: q.question_text.clone(),
                    options: q.options.clone(),
                    selected_option: state.selected_option,
                    answer_status: state.answer_status,
                    correct_answer_index: answered.then_some(q.correct_answer_index),
                    correct_option: q.correct_option().filter(|_| answered).map(str::to_string),
                    explanation: answered.then(|| q.explanation.clone()),
                    illustration: nav.illustration().cloned().unwrap_or(Illustration::None),
                })
            }
            None => {
                warn!(target: "lesson", "Lesson screen without a session; showing the map");
                map_view(nav)
            }
        },
    }
}

fn map_view(nav: &Navigator) -> ScreenView {
    let progress = nav.progress();
    ScreenView::Map {
        language: progress.target_language().map(str::to_string),
        hearts: progress.hearts(),
        max_hearts: progress.max_hearts(),
        xp: progress.xp(),
        completed_lessons: progress.completed_lesson_ids().len(),
        path: progress.topic_path(nav.topics()),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    pub language: String,
    pub topic: String,
}

/// Stateless lesson delivery: the full content, answers included.
#[derive(Serialize)]
pub struct LessonOut {
    pub title: String,
    pub source: ContentSource,
    pub questions: Vec<Question>,
}

impl From<LessonContent> for LessonOut {
    fn from(c: LessonContent) -> Self {
        Self { title: c.title, source: c.source, questions: c.questions }
    }
}

#[derive(Deserialize)]
pub struct IllustrationIn {
    pub description: String,
}
#[derive(Serialize)]
pub struct IllustrationOut {
    pub image: Option<ImageHandle>,
}

#[derive(Serialize)]
pub struct LanguagesOut {
    pub languages: Vec<LanguageOption>,
}

#[derive(Serialize)]
pub struct TopicsOut {
    pub topics: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub online: bool,
}
