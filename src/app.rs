use crate::config::Config;
use crate::credentials::{CredentialStore, PromptReason, PromptRequest};
use crate::map::MapView;
use crate::models::ProviderId;
use crate::provider::ProviderEvent;
use crate::session::LocationSession;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const RADIO_TYPES: [&str; 5] = ["gsm", "cdma", "wcdma", "lte", "nr"];
const TIMEOUT_STEP: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    ApiKey,
    Mcc,
    Mnc,
    Carrier,
}

impl InputField {
    pub fn label(&self) -> &'static str {
        match self {
            InputField::ApiKey => "API key",
            InputField::Mcc => "Mobile country code (MCC)",
            InputField::Mnc => "Mobile network code (MNC)",
            InputField::Carrier => "Carrier name",
        }
    }
}

#[derive(Debug)]
pub enum InputMode {
    Normal,
    /// Editing one of the remote provider's text settings.
    Editing { field: InputField, buffer: String },
    /// A provider is waiting for an API key.
    Prompt { reason: PromptReason, buffer: String },
}

pub struct App {
    pub session: LocationSession,
    pub map: MapView,
    pub config: Config,
    pub config_path: PathBuf,
    pub credentials: Arc<dyn CredentialStore>,
    /// Whether an API key is stored. Refreshed when the key can have changed
    /// rather than read from disk on every frame.
    pub has_key: bool,
    pub mode: InputMode,
    pub pending_prompt: Option<PromptRequest>,
    pub settings_message: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        session: LocationSession,
        config: Config,
        config_path: impl Into<PathBuf>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let has_key = credentials.get().is_some();
        Self {
            session,
            map: MapView::default(),
            config,
            config_path: config_path.into(),
            credentials,
            has_key,
            mode: InputMode::Normal,
            pending_prompt: None,
            settings_message: None,
            should_quit: false,
        }
    }

    pub fn on_tick(&mut self) {
        self.session.expire_notification(Instant::now());
    }

    pub fn on_provider_event(&mut self, event: ProviderEvent) {
        // The remote provider stores prompted keys and drops rejected ones.
        if matches!(event, ProviderEvent::Settled { provider: ProviderId::Remote, .. }) {
            self.has_key = self.credentials.get().is_some();
        }
        if !self.session.handle_event(event) {
            return;
        }
        if let Some(result) = &self.session.state().result {
            self.map
                .set_view(result.latitude, result.longitude, result.accuracy_meters);
        }
    }

    pub fn on_prompt(&mut self, request: PromptRequest) {
        if let Some(previous) = self.pending_prompt.take() {
            let _ = previous.reply.send(None);
        }
        self.mode = InputMode::Prompt {
            reason: request.reason,
            buffer: String::new(),
        };
        self.pending_prompt = Some(request);
    }

    fn answer_prompt(&mut self, answer: Option<String>) {
        if let Some(request) = self.pending_prompt.take() {
            let _ = request.reply.send(answer);
        }
        self.mode = InputMode::Normal;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match std::mem::replace(&mut self.mode, InputMode::Normal) {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Editing { field, mut buffer } => match key.code {
                KeyCode::Enter => self.commit_field(field, buffer),
                KeyCode::Esc => {}
                KeyCode::Backspace => {
                    buffer.pop();
                    self.mode = InputMode::Editing { field, buffer };
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    self.mode = InputMode::Editing { field, buffer };
                }
                _ => self.mode = InputMode::Editing { field, buffer },
            },
            InputMode::Prompt { reason, mut buffer } => match key.code {
                KeyCode::Enter => self.answer_prompt(Some(buffer)),
                KeyCode::Esc => self.answer_prompt(None),
                KeyCode::Backspace => {
                    buffer.pop();
                    self.mode = InputMode::Prompt { reason, buffer };
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    self.mode = InputMode::Prompt { reason, buffer };
                }
                _ => self.mode = InputMode::Prompt { reason, buffer },
            },
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.switch(ProviderId::Device),
            KeyCode::Char('2') => self.switch(ProviderId::Remote),
            KeyCode::Char('3') => self.switch(ProviderId::Ip),
            KeyCode::Char('r') => self.session.refresh(),
            KeyCode::Esc => self.session.dismiss_notification(),
            KeyCode::Char('l') => {
                let mut device = self.session.device_settings();
                device.live_tracking = !device.live_tracking;
                self.session.set_device_settings(device);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let mut device = self.session.device_settings();
                device.timeout_seconds += TIMEOUT_STEP;
                self.session.set_device_settings(device);
            }
            KeyCode::Char('-') => {
                let mut device = self.session.device_settings();
                device.timeout_seconds = device.timeout_seconds.saturating_sub(TIMEOUT_STEP).max(1);
                self.session.set_device_settings(device);
            }
            KeyCode::Char('w') => self.update_remote(|o| o.use_wifi = !o.use_wifi),
            KeyCode::Char('c') => self.update_remote(|o| o.use_cell = !o.use_cell),
            KeyCode::Char('i') => self.update_remote(|o| o.consider_ip = !o.consider_ip),
            KeyCode::Char('t') => self.update_remote(|o| {
                let next = RADIO_TYPES
                    .iter()
                    .position(|r| *r == o.radio_type)
                    .map_or(0, |i| (i + 1) % RADIO_TYPES.len());
                o.radio_type = RADIO_TYPES[next].to_string();
            }),
            KeyCode::Char('m') => self.begin_edit(InputField::Mcc),
            KeyCode::Char('n') => self.begin_edit(InputField::Mnc),
            KeyCode::Char('a') => self.begin_edit(InputField::Carrier),
            KeyCode::Char('k') => self.begin_edit(InputField::ApiKey),
            KeyCode::Char('s') => self.save_config(),
            _ => {}
        }
    }

    fn switch(&mut self, id: ProviderId) {
        self.map.reset();
        self.session.switch_provider(id);
    }

    fn update_remote(&mut self, change: impl FnOnce(&mut crate::models::RemoteOptions)) {
        let mut options = self.session.remote_options().clone();
        change(&mut options);
        self.session.set_remote_options(options);
    }

    fn begin_edit(&mut self, field: InputField) {
        let options = self.session.remote_options();
        let current = match field {
            InputField::ApiKey => None,
            InputField::Mcc => options.mcc.clone(),
            InputField::Mnc => options.mnc.clone(),
            InputField::Carrier => options.carrier.clone(),
        };
        self.mode = InputMode::Editing {
            field,
            buffer: current.unwrap_or_default(),
        };
    }

    fn commit_field(&mut self, field: InputField, buffer: String) {
        let value = buffer.trim().to_string();
        let value = (!value.is_empty()).then_some(value);
        match field {
            InputField::ApiKey => match value {
                Some(key) => {
                    self.credentials.set(&key);
                    self.has_key = true;
                    self.settings_message = Some("API key saved".to_string());
                    if self.session.active() == ProviderId::Remote {
                        self.session.refresh();
                    }
                }
                None => {
                    self.credentials.remove();
                    self.has_key = false;
                    self.settings_message = Some("API key removed".to_string());
                }
            },
            InputField::Mcc => self.update_remote(|o| o.mcc = value),
            InputField::Mnc => self.update_remote(|o| o.mnc = value),
            InputField::Carrier => self.update_remote(|o| o.carrier = value),
        }
    }

    fn save_config(&mut self) {
        self.config
            .apply(self.session.device_settings(), self.session.remote_options());
        self.config.ui.default_provider = self.session.active();
        match self.config.save_to(&self.config_path) {
            Ok(()) => {
                info!("Saved settings to {}", self.config_path.display());
                self.settings_message = Some(format!("Saved {}", self.config_path.display()));
            }
            Err(e) => {
                warn!("Saving settings failed: {}", e);
                self.settings_message = Some(format!("Save failed: {e}"));
            }
        }
    }
}
