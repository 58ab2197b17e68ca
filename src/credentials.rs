//! API key storage and the interactive prompt used when a key is missing
//! or rejected.

use futures::future::BoxFuture;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Simple get/set/remove store for a single credential.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, value: &str);
    fn remove(&self);
}

/// Keeps the key in a plain file next to `config.toml`.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        let key = content.trim();
        (!key.is_empty()).then(|| key.to_string())
    }

    fn set(&self, value: &str) {
        match fs::write(&self.path, value.trim()) {
            Ok(()) => info!("Stored API key in {}", self.path.display()),
            Err(e) => warn!("Could not store API key in {}: {}", self.path.display(), e),
        }
    }

    fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Removed stored API key"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, value: &str) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
    }

    fn remove(&self) {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Why the user is being asked for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReason {
    Missing,
    Rejected,
}

impl PromptReason {
    pub fn message(&self) -> &'static str {
        match self {
            PromptReason::Missing => "Enter your geolocation API key",
            PromptReason::Rejected => "The API key was rejected. Enter a new key",
        }
    }
}

/// Asks the user for a credential. Resolves to `None` when they decline.
pub trait CredentialPrompt: Send + Sync {
    fn request_key(&self, reason: PromptReason) -> BoxFuture<'_, Option<String>>;
}

/// A pending prompt waiting for the UI to answer.
#[derive(Debug)]
pub struct PromptRequest {
    pub reason: PromptReason,
    pub reply: oneshot::Sender<Option<String>>,
}

/// Forwards prompts to the event loop, which shows an input modal and
/// answers through the oneshot.
#[derive(Clone)]
pub struct ChannelPrompt {
    tx: mpsc::UnboundedSender<PromptRequest>,
}

impl ChannelPrompt {
    pub fn new(tx: mpsc::UnboundedSender<PromptRequest>) -> Self {
        Self { tx }
    }
}

impl CredentialPrompt for ChannelPrompt {
    fn request_key(&self, reason: PromptReason) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            let (reply, answer) = oneshot::channel();
            if self.tx.send(PromptRequest { reason, reply }).is_err() {
                warn!("Credential prompt requested but the UI is gone");
                return None;
            }
            answer
                .await
                .ok()
                .flatten()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("key"));
        assert_eq!(store.get(), None);

        store.set("  abc123\n");
        assert_eq!(store.get().as_deref(), Some("abc123"));

        store.remove();
        store.remove();
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn channel_prompt_trims_and_drops_blank_answers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let prompt = ChannelPrompt::new(tx);

        tokio::spawn(async move {
            let first: PromptRequest = rx.recv().await.unwrap();
            assert_eq!(first.reason, PromptReason::Missing);
            first.reply.send(Some(" k-1 ".into())).unwrap();
            let second = rx.recv().await.unwrap();
            second.reply.send(Some("   ".into())).unwrap();
        });

        assert_eq!(prompt.request_key(PromptReason::Missing).await.as_deref(), Some("k-1"));
        assert_eq!(prompt.request_key(PromptReason::Rejected).await, None);
    }
}
