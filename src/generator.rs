use tokio::sync::watch;

use crate::api::{ContentGenerator, create_generator};
use crate::config::Config;
use crate::error::GenerationError;
use crate::models::{GenerationState, GenerationStatus};
use crate::parser::{build_prompt, parse_flashcards};

pub const IN_FLIGHT_MESSAGE: &str = "Generating flashcards...";

// Builds a content generator for a given API key
pub type Connector =
    Box<dyn Fn(&str) -> anyhow::Result<Box<dyn ContentGenerator>> + Send + Sync>;

// One attempt at a time; every transition is published to subscribers
pub struct FlashcardGenerator {
    connector: Connector,
    state: watch::Sender<GenerationState>,
}

impl FlashcardGenerator {
    pub fn new(config: &Config) -> Self {
        let api = config.api.clone();
        let processing = config.processing.clone();
        Self::with_connector(Box::new(move |api_key: &str| {
            create_generator(&api, &processing, api_key)
        }))
    }

    pub fn with_connector(connector: Connector) -> Self {
        let (state, _) = watch::channel(GenerationState::default());
        FlashcardGenerator { connector, state }
    }

    pub fn state(&self) -> GenerationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    pub fn is_generating(&self) -> bool {
        self.state.borrow().is_generating()
    }

    // Status line text: progress while in flight, the error once failed
    pub fn status_message(&self) -> String {
        let state = self.state.borrow();
        match state.status {
            GenerationStatus::InFlight => IN_FLIGHT_MESSAGE.to_string(),
            _ => state.error_message(),
        }
    }

    pub async fn generate(&mut self, topic: &str, api_key: &str) -> GenerationState {
        self.transition(GenerationStatus::Validating, None);

        if topic.trim().is_empty() {
            return self.fail(GenerationError::MissingTopic);
        }
        if api_key.is_empty() {
            return self.fail(GenerationError::MissingCredential);
        }

        let generator = match (self.connector)(api_key) {
            Ok(generator) => generator,
            Err(e) => return self.fail(GenerationError::RequestError(e.to_string())),
        };

        self.transition(GenerationStatus::InFlight, None);
        tracing::info!(
            "generating flashcards for {:?} with {} ({})",
            topic,
            generator.service_name(),
            generator.model()
        );

        let text = match generator.generate(&build_prompt(topic)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("generation request failed: {}", e);
                return self.fail(e);
            }
        };

        if text.is_empty() {
            return self.fail(GenerationError::EmptyResponse);
        }

        let flashcards = parse_flashcards(&text);
        if flashcards.is_empty() {
            tracing::warn!("response had no parsable lines ({} bytes)", text.len());
            return self.fail(GenerationError::NoValidFlashcards);
        }

        tracing::info!("parsed {} flashcards", flashcards.len());
        self.state.send_replace(GenerationState {
            status: GenerationStatus::Succeeded,
            flashcards,
            error: None,
        });
        self.state()
    }

    pub fn clear(&mut self) {
        self.state.send_replace(GenerationState::default());
    }

    fn transition(&self, status: GenerationStatus, error: Option<GenerationError>) {
        self.state.send_replace(GenerationState {
            status,
            flashcards: Vec::new(),
            error,
        });
    }

    fn fail(&self, error: GenerationError) -> GenerationState {
        self.transition(GenerationStatus::Failed, Some(error));
        self.state()
    }
}
