//! Console implementations of the engine's ports.

use async_trait::async_trait;
use fieldbook_model::{ConflictChoice, ConflictOrigin, ConflictPrompt};
use fieldbook_sync_engine::{
    AuthEvent, AuthProvider, AuthUser, ConflictResolutionPort, Notifier,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// A session fixed by configuration for the life of the process.
pub struct StaticAuth {
    user: Option<AuthUser>,
    events: broadcast::Sender<AuthEvent>,
}

impl StaticAuth {
    /// Creates a provider reporting `user` as signed in.
    pub fn new(user: Option<AuthUser>) -> Self {
        let (events, _) = broadcast::channel(1);
        Self { user, events }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.user.clone()
    }

    fn is_email_verified(&self) -> bool {
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Prints notifications; errors go to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, is_error: bool) {
        if is_error {
            eprintln!("error: {message}");
        } else {
            println!("{message}");
        }
    }
}

/// Answers conflict prompts from a fixed preference or from stdin.
pub struct ConsoleResolver {
    preference: Option<ConflictChoice>,
}

impl ConsoleResolver {
    /// Creates a resolver. Without a preference every conflict is asked.
    pub fn new(preference: Option<ConflictChoice>) -> Self {
        Self { preference }
    }
}

#[async_trait]
impl ConflictResolutionPort for ConsoleResolver {
    async fn choose(&self, prompt: ConflictPrompt) -> ConflictChoice {
        if let Some(choice) = self.preference {
            return choice;
        }

        let origin = match prompt.origin {
            ConflictOrigin::Sync => "sync",
            ConflictOrigin::Migration => "migration",
        };
        println!(
            "Conflict on {} ({origin}); differing fields: {}",
            prompt.key,
            prompt.subject.differing_fields().join(", ")
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            println!("Keep [l]ocal or [r]emote version?");
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(choice) = parse_choice(&line) {
                        return choice;
                    }
                }
                Ok(None) | Err(_) => {
                    tracing::warn!(key = %prompt.key, "no answer on stdin; keeping remote version");
                    return ConflictChoice::KeepRemote;
                }
            }
        }
    }
}

/// Parses an interactive answer.
pub fn parse_choice(answer: &str) -> Option<ConflictChoice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "l" | "local" => Some(ConflictChoice::KeepLocal),
        "r" | "remote" | "cloud" => Some(ConflictChoice::KeepRemote),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_are_parsed_loosely() {
        assert_eq!(parse_choice(" L\n"), Some(ConflictChoice::KeepLocal));
        assert_eq!(parse_choice("cloud"), Some(ConflictChoice::KeepRemote));
        assert_eq!(parse_choice("maybe"), None);
    }

    #[test]
    fn static_auth_reports_configured_user() {
        let auth = StaticAuth::new(Some(AuthUser::new("crew-7")));
        assert_eq!(auth.current_user().map(|u| u.uid), Some("crew-7".to_string()));
        assert!(StaticAuth::new(None).current_user().is_none());
    }
}
