use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::config::Config;
use crate::core::error::{GenerationError, Provider};
use crate::core::script::{Panel, Script};
use crate::core::state::{PanelState, PanelStateTable};
use crate::core::style;
use crate::services::image::{find_model, GenerationConfig, ImageClient, ModelInfo, MODELS};

// Session settings are threaded explicitly into every generation call;
// nothing here reads ambient process state.
#[derive(Clone)]
pub struct Settings {
    pub model: &'static ModelInfo,
    pub aspect_ratio: String,
    pub style_prompt: String,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_pacing_ms: u64,
    pub openai_pacing_ms: u64,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        let model = find_model(&config.image.model).unwrap_or_else(|| {
            log::warn!(
                "Unknown image model {:?} in config, using {}",
                config.image.model,
                MODELS[0].id
            );
            &MODELS[0]
        });

        let style_prompt = match (&config.style.prompt, &config.style.preset) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(preset)) => style::resolve(preset),
            (None, None) => style::DEFAULT_STYLE_PROMPT.to_string(),
        };

        Self {
            model,
            aspect_ratio: config.image.aspect_ratio.clone(),
            style_prompt,
            google_api_key: config.api.google_api_key.clone(),
            openai_api_key: config.api.openai_api_key.clone(),
            google_pacing_ms: config.image.google_pacing_ms,
            openai_pacing_ms: config.image.openai_pacing_ms,
        }
    }

    pub fn api_key_for(&self, provider: Provider) -> Option<String> {
        let key = match provider {
            Provider::Google => &self.google_api_key,
            Provider::OpenAi => &self.openai_api_key,
        };
        key.as_deref()
            .filter(|k| !k.trim().is_empty())
            .map(str::to_string)
    }

    pub fn set_api_key(&mut self, provider: Provider, key: String) {
        match provider {
            Provider::Google => self.google_api_key = Some(key),
            Provider::OpenAi => self.openai_api_key = Some(key),
        }
    }

    pub fn clear_api_key(&mut self, provider: Provider) {
        match provider {
            Provider::Google => self.google_api_key = None,
            Provider::OpenAi => self.openai_api_key = None,
        }
    }

    pub fn pacing(&self, provider: Provider) -> Duration {
        match provider {
            Provider::Google => Duration::from_millis(self.google_pacing_ms),
            Provider::OpenAi => Duration::from_millis(self.openai_pacing_ms),
        }
    }
}

#[derive(Clone, Default)]
pub struct CancelToken(std::sync::Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Cancelled,
    AlreadyRunning,
}

// Presentation subscribes here; the orchestrator never renders.
pub trait StateListener: Send + Sync {
    fn on_transition(&self, _id: u32, _state: &PanelState) {}
    fn on_batch_started(&self, _total: usize) {}
    fn on_batch_finished(&self, _outcome: BatchOutcome) {}
}

pub struct NullListener;

impl StateListener for NullListener {}

pub struct GenerationManager {
    settings: Mutex<Settings>,
    states: PanelStateTable,
    client: Box<dyn ImageClient>,
    listener: Box<dyn StateListener>,
    batch_running: AtomicBool,
    active_cancel: Mutex<Option<CancelToken>>,
}

struct RunGuard<'a> {
    manager: &'a GenerationManager,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.manager.active_cancel.lock().unwrap() = None;
        self.manager.batch_running.store(false, Ordering::SeqCst);
    }
}

impl GenerationManager {
    pub fn new(
        settings: Settings,
        client: Box<dyn ImageClient>,
        listener: Box<dyn StateListener>,
    ) -> Self {
        Self {
            settings: Mutex::new(settings),
            states: PanelStateTable::new(),
            client,
            listener,
            batch_running: AtomicBool::new(false),
            active_cancel: Mutex::new(None),
        }
    }

    pub fn states(&self) -> &PanelStateTable {
        &self.states
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut Settings)) {
        let mut settings = self.settings.lock().unwrap();
        update(&mut settings);
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::SeqCst)
    }

    // Cooperative: never aborts a call already in flight, only keeps the
    // next panel from starting.
    pub fn request_cancel(&self) {
        if let Some(token) = self.active_cancel.lock().unwrap().as_ref() {
            token.cancel();
        }
    }

    fn set_state(&self, id: u32, state: PanelState) {
        self.states.set(id, state.clone());
        self.listener.on_transition(id, &state);
    }

    // Fails only when the credential precondition is unmet, before any state
    // transition. Provider failures are absorbed into the panel's Error state.
    pub async fn generate_panel(&self, panel: &Panel) -> Result<(), GenerationError> {
        let (config, style_prompt) = {
            let settings = self.settings.lock().unwrap();
            let provider = settings.model.provider;
            let api_key = settings
                .api_key_for(provider)
                .ok_or(GenerationError::MissingCredential(provider))?;
            (
                GenerationConfig::new(settings.model, api_key, settings.aspect_ratio.clone()),
                settings.style_prompt.clone(),
            )
        };

        self.set_state(panel.id, PanelState::Loading);

        match self.client.generate(panel, &style_prompt, &config).await {
            Ok(image) => self.set_state(panel.id, PanelState::Success(image)),
            Err(err) => {
                if err.is_credential_rejection() {
                    log::warn!("{} rejected the API key, clearing it", config.provider);
                    self.settings.lock().unwrap().clear_api_key(config.provider);
                }
                self.set_state(panel.id, PanelState::Error(err.to_string()));
            }
        }

        Ok(())
    }

    pub async fn run_all(&self, script: &Script) -> Result<BatchOutcome, GenerationError> {
        if self.batch_running.swap(true, Ordering::SeqCst) {
            return Ok(BatchOutcome::AlreadyRunning);
        }
        let _guard = RunGuard { manager: self };

        let token = CancelToken::new();
        *self.active_cancel.lock().unwrap() = Some(token.clone());

        self.listener.on_batch_started(script.len());

        let mut outcome = BatchOutcome::Completed;
        for panel in script.panels() {
            if token.is_cancelled() {
                outcome = BatchOutcome::Cancelled;
                break;
            }
            if self.states.get(panel.id).is_success() {
                continue;
            }

            // Every started batch gets a finished event, even when the run
            // aborts on a missing credential.
            if let Err(err) = self.generate_panel(panel).await {
                self.listener.on_batch_finished(BatchOutcome::Cancelled);
                return Err(err);
            }

            let delay = {
                let settings = self.settings.lock().unwrap();
                settings.pacing(settings.model.provider)
            };
            tokio::time::sleep(delay).await;
        }

        self.listener.on_batch_finished(outcome);
        Ok(outcome)
    }
}
