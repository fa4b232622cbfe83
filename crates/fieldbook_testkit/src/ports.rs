//! Scripted implementations of the engine's ports.

use async_trait::async_trait;
use fieldbook_model::{ConflictChoice, ConflictPrompt};
use fieldbook_sync_engine::{AuthEvent, AuthProvider, AuthUser, ConflictResolutionPort, Notifier};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// An auth provider driven by the test.
pub struct TestAuth {
    user: Mutex<Option<AuthUser>>,
    verified: AtomicBool,
    events: broadcast::Sender<AuthEvent>,
}

impl TestAuth {
    /// Creates a provider with nobody signed in and email verified.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            user: Mutex::new(None),
            verified: AtomicBool::new(true),
            events,
        }
    }

    /// Signs `user` in and broadcasts the event.
    pub fn sign_in(&self, user: AuthUser) {
        *self.user.lock() = Some(user.clone());
        let _ = self.events.send(AuthEvent::SignedIn(user));
    }

    /// Signs out and broadcasts the event.
    pub fn sign_out(&self) {
        *self.user.lock() = None;
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Sets whether the email address counts as verified.
    pub fn set_verified(&self, verified: bool) {
        self.verified.store(verified, Ordering::SeqCst);
    }
}

impl Default for TestAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for TestAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.user.lock().clone()
    }

    fn is_email_verified(&self) -> bool {
        self.verified.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// A notifier that remembers every message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, bool)>>,
}

impl RecordingNotifier {
    /// Creates an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message with its error flag, oldest first.
    pub fn messages(&self) -> Vec<(String, bool)> {
        self.messages.lock().clone()
    }

    /// Messages sent in the error style.
    pub fn errors(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(_, is_error)| *is_error)
            .map(|(message, _)| message.clone())
            .collect()
    }

    /// Returns true if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|(message, _)| message.contains(needle))
    }

    /// Forgets every message.
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, is_error: bool) {
        self.messages.lock().push((message.to_string(), is_error));
    }
}

/// A conflict port that answers from a script.
///
/// Queued answers are used first; after that every prompt gets the
/// fallback choice.
pub struct ScriptedResolver {
    script: Mutex<VecDeque<ConflictChoice>>,
    fallback: Mutex<ConflictChoice>,
    prompts: Mutex<Vec<ConflictPrompt>>,
}

impl ScriptedResolver {
    /// Answers every prompt with `choice`.
    pub fn always(choice: ConflictChoice) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(choice),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queues one answer.
    pub fn push(&self, choice: ConflictChoice) {
        self.script.lock().push_back(choice);
    }

    /// Changes the answer used once the script runs out.
    pub fn set_fallback(&self, choice: ConflictChoice) {
        *self.fallback.lock() = choice;
    }

    /// Every prompt received, oldest first.
    pub fn prompts(&self) -> Vec<ConflictPrompt> {
        self.prompts.lock().clone()
    }

    /// Number of prompts received.
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

impl Default for ScriptedResolver {
    fn default() -> Self {
        Self::always(ConflictChoice::KeepRemote)
    }
}

#[async_trait]
impl ConflictResolutionPort for ScriptedResolver {
    async fn choose(&self, prompt: ConflictPrompt) -> ConflictChoice {
        self.prompts.lock().push(prompt);
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| *self.fallback.lock())
    }
}
