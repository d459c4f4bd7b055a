use crate::core::book::{ArtStyle, GeneratedBook};
use crate::core::error::GenError;
use crate::core::inputs::StoryInputs;
use crate::core::keys::KeyStore;
use crate::services::gateway::StoryGateway;
use crate::services::pipeline::StorybookPipeline;
use rand::Rng;
use std::sync::Arc;

/// Application state for one user session: the credential context, the story
/// inputs, the (possibly partial) generated book and the transition flags.
/// All mutation goes through the methods below; each one is atomic with
/// respect to the single event loop.
pub struct AppState {
    keys: Arc<dyn KeyStore>,
    /// The one active credential context. Rebuilt whenever the credential
    /// changes, dropped when it is cleared or reported invalid.
    gateway: Option<StoryGateway>,
    pub inputs: StoryInputs,
    pub book: GeneratedBook,
    pub is_generating_book: bool,
    pub is_generating_surprise: bool,
    pub last_error: Option<GenError>,
}

impl AppState {
    /// Restores the session from the key store; a persisted credential puts
    /// the app straight into ready mode.
    pub fn new(keys: Arc<dyn KeyStore>) -> Self {
        let gateway = keys
            .load()
            .and_then(|key| StoryGateway::with_key(&key).ok());
        Self {
            keys,
            gateway,
            inputs: StoryInputs::default(),
            book: GeneratedBook::default(),
            is_generating_book: false,
            is_generating_surprise: false,
            last_error: None,
        }
    }

    /// Installs a prebuilt gateway (custom or mock backend) in place of the
    /// credential-derived one.
    pub fn attach_gateway(&mut self, gateway: StoryGateway) {
        self.gateway = Some(gateway);
    }

    pub fn has_credential(&self) -> bool {
        self.gateway.is_some()
    }

    fn busy(&self) -> bool {
        self.is_generating_book || self.is_generating_surprise
    }

    /// Persists the credential and rebuilds the gateway around it.
    pub fn set_credential(&mut self, key: &str) -> Result<(), GenError> {
        let key = key.trim();
        let gateway = StoryGateway::with_key(key)?;
        if let Err(e) = self.keys.store(key) {
            log::warn!("Failed to persist API key: {:#}", e);
        }
        self.gateway = Some(gateway);
        self.last_error = None;
        Ok(())
    }

    /// Forgets the credential and returns to credential-required mode.
    pub fn clear_credential(&mut self) {
        if let Err(e) = self.keys.clear() {
            log::warn!("Failed to clear persisted API key: {:#}", e);
        }
        self.gateway = None;
    }

    /// Resizes the story to `count` pages, preserving existing texts by
    /// position. Any generated book is stale at a new page count and is
    /// discarded. Ignored while a run is active.
    pub fn set_page_count(&mut self, count: usize) {
        if self.busy() {
            return;
        }
        self.inputs.set_page_count(count);
        self.book.clear();
    }

    /// Runs the full pipeline, applying every published snapshot to the owned
    /// book and forwarding it to `on_snapshot`. No-op while a run is active.
    pub async fn start_generation(&mut self, mut on_snapshot: impl FnMut(&GeneratedBook)) {
        if self.is_generating_book {
            log::warn!("Generation already running; request ignored");
            return;
        }
        self.last_error = None;
        self.book.clear();

        let result = match &self.gateway {
            None => Err(GenError::MissingOrInvalidCredential),
            Some(gateway) => {
                self.is_generating_book = true;
                let book = &mut self.book;
                StorybookPipeline::new(gateway)
                    .run(&self.inputs, |snapshot| {
                        *book = snapshot.clone();
                        on_snapshot(book);
                    })
                    .await
                    .map(|_| ())
            }
        };

        self.is_generating_book = false;
        if let Err(err) = result {
            self.handle_error(err);
        }
    }

    /// Replaces the inputs with generated ones: a random page count in 1..=5,
    /// a random art style and model-written character/story. The prior inputs
    /// survive a failure, apart from the already-applied page count.
    pub async fn surprise_me(&mut self) {
        if self.busy() {
            return;
        }
        self.last_error = None;

        let page_count = rand::rng().random_range(1..=5);
        self.inputs.set_page_count(page_count);
        self.book.clear();

        let result = match &self.gateway {
            None => Err(GenError::MissingOrInvalidCredential),
            Some(gateway) => {
                self.is_generating_surprise = true;
                gateway.generate_surprise_content(page_count).await
            }
        };

        self.is_generating_surprise = false;
        match result {
            Ok(content) => {
                self.inputs.art_style = Some(ArtStyle::random());
                self.inputs.character = content.character;
                self.inputs.page_texts = content.story;
            }
            Err(err) => self.handle_error(err),
        }
    }

    /// Back to a blank three-page story.
    pub fn start_over(&mut self) {
        if self.busy() {
            return;
        }
        self.inputs = StoryInputs::default();
        self.book.clear();
        self.last_error = None;
    }

    /// Single reaction point for classified failures: an invalid credential
    /// forces re-entry, and a partial book is never left visible.
    fn handle_error(&mut self, err: GenError) {
        if err == GenError::MissingOrInvalidCredential {
            self.clear_credential();
        }
        self.book.clear();
        self.last_error = Some(err);
    }
}
