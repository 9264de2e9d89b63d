//! Application state shared by every handler: lesson config and the content provider.
//!
//! Learner state is not kept here. Each WebSocket connection owns its own `Navigator`
//! (see `routes::ws`), so nothing learner-specific is shared between tasks.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::{load_lesson_config_from_env, LessonConfig};
use crate::gemini::Gemini;
use crate::navigation::Navigator;
use crate::progress::LearnerProgress;
use crate::provider::{ContentProvider, GeminiProvider};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LessonConfig>,
    pub provider: Arc<dyn ContentProvider>,
}

impl AppState {
    /// Build state from env: load config, init Gemini, wrap it in the provider.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_lesson_config_from_env();

        let gemini = Gemini::from_env();
        if let Some(g) = &gemini {
            info!(target: "lingoai_backend", base_url = %g.base_url, text_model = %g.text_model, image_model = %g.image_model, "Gemini enabled.");
        } else {
            info!(target: "lingoai_backend", "Gemini disabled (no GEMINI_API_KEY). Serving offline lessons.");
        }
        info!(
            target: "lingoai_backend",
            topics = config.topics.len(),
            languages = config.languages.len(),
            max_hearts = config.max_hearts,
            questions_per_lesson = config.questions_per_lesson,
            "Lesson configuration"
        );

        let provider = Arc::new(GeminiProvider::new(gemini, &config));
        Self::with_provider(config, provider)
    }

    /// Assemble state from parts (tests inject a stub provider here).
    pub fn with_provider(config: LessonConfig, provider: Arc<dyn ContentProvider>) -> Self {
        Self { config: Arc::new(config), provider }
    }

    pub fn provider_online(&self) -> bool {
        self.provider.is_online()
    }

    /// Fresh navigator for a new learner, starting on the welcome screen.
    pub fn new_navigator(&self) -> Navigator {
        Navigator::new(
            LearnerProgress::new(self.config.max_hearts),
            self.config.topics.clone(),
        )
    }
}
