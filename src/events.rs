//! Event types and the main event loop driver for the locus TUI.
//!
//! [`EventHandler`] runs a background task that polls crossterm for key
//! events and emits periodic [`Event::Tick`]s. Provider results and
//! credential prompts are forwarded into the same channel, so the main loop
//! in `main.rs` handles everything through [`EventHandler::next`].

use crate::credentials::PromptRequest;
use crate::provider::ProviderEvent;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
pub enum Event {
    /// Periodic tick; expires notifications.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// A reading or settled acquisition from a location provider.
    Provider(ProviderEvent),
    /// A provider needs an API key from the user.
    Prompt(PromptRequest),
}

/// Multiplexes terminal input, ticks and provider traffic into one stream.
///
/// The sender ([`tx`](EventHandler::tx)) can be cloned and handed to other
/// tasks; the receiver is consumed by [`next`](EventHandler::next).
pub struct EventHandler {
    /// Sender for posting events from other tasks.
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The input task polls crossterm with a timeout of `tick_rate_ms`. If the
    /// terminal becomes unreadable it logs the error and stops, which ends
    /// input but leaves provider events flowing.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            if event_tx.send(Event::Input(key)).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        break;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Forwards provider events into the main channel.
    pub fn forward_provider_events(&self, mut rx: mpsc::UnboundedReceiver<ProviderEvent>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if tx.send(Event::Provider(event)).is_err() {
                    break;
                }
            }
        });
    }

    /// Forwards credential prompts into the main channel.
    pub fn forward_prompts(&self, mut rx: mpsc::UnboundedReceiver<PromptRequest>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                if tx.send(Event::Prompt(request)).is_err() {
                    break;
                }
            }
        });
    }

    /// Receives the next event from the channel.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
