//! Wires auth events, connectivity changes and remote subscriptions to
//! the engine's triggers.

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::ports::{AuthEvent, AuthUser};
use crate::report::SyncReport;
use crate::state::SyncState;
use fieldbook_remote::{Collection, RemoteChange};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIRRORED: [Collection; 2] = [Collection::Entries, Collection::Settings];

type ChangeSender = mpsc::UnboundedSender<(Collection, RemoteChange)>;

/// Drives a [`SyncEngine`] from the outside world until shut down.
///
/// - a sign-in runs the migration and a pass, then subscribes to both
///   mirrored collections
/// - a sign-out drops the subscriptions
/// - connectivity changes are forwarded to [`SyncEngine::set_online`]
/// - an engine left offline by a failed remote call is retried every
///   `reconnect_interval` while the network reports a connection
/// - pushed remote changes go to [`SyncEngine::handle_remote_change`]
pub struct SyncCoordinator {
    engine: Arc<SyncEngine>,
    forwarders: Vec<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Creates a coordinator for `engine`.
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            forwarders: Vec::new(),
        }
    }

    /// Runs until `shutdown` resolves or the auth provider goes away.
    pub async fn run<F>(mut self, mut connectivity: watch::Receiver<bool>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut auth_events = self.engine.auth_events();
        let (change_tx, mut change_rx) = mpsc::unbounded_channel();
        tokio::pin!(shutdown);

        let online = *connectivity.borrow_and_update();
        log_pass("connectivity", self.engine.set_online(online).await);
        if let Some(user) = self.engine.session_user() {
            self.signed_in(user, &change_tx).await;
        }

        let mut reconnect = self.engine.config().reconnect_interval.map(|every| {
            let mut timer = tokio::time::interval_at(Instant::now() + every, every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        let mut watching_network = true;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("coordinator shutting down");
                    break;
                }
                event = auth_events.recv() => match event {
                    Ok(AuthEvent::SignedIn(user)) => self.signed_in(user, &change_tx).await,
                    Ok(AuthEvent::SignedOut) => {
                        self.stop_forwarders();
                        self.engine.on_user_sign_out();
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed auth events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("auth provider closed; coordinator stopping");
                        break;
                    }
                },
                changed = connectivity.changed(), if watching_network => match changed {
                    Ok(()) => {
                        let online = *connectivity.borrow_and_update();
                        info!(online, "connectivity changed");
                        log_pass("reconnect", self.engine.set_online(online).await);
                    }
                    Err(_) => watching_network = false,
                },
                () = next_tick(&mut reconnect) => self.retry_offline(&connectivity).await,
                Some((collection, change)) = change_rx.recv() => {
                    if let Err(err) = self.engine.handle_remote_change(collection, change).await {
                        warn!(%collection, error = %err, "pushed change not applied");
                    }
                }
            }
        }
        self.stop_forwarders();
    }

    async fn signed_in(&mut self, user: AuthUser, changes: &ChangeSender) {
        self.stop_forwarders();
        log_pass("sign-in", self.engine.on_user_sign_in(user).await);

        for collection in MIRRORED {
            match self.engine.subscribe(collection).await {
                Ok(mut subscription) => {
                    let changes = changes.clone();
                    self.forwarders.push(tokio::spawn(async move {
                        while let Some(change) = subscription.next().await {
                            if changes.send((collection, change)).is_err() {
                                break;
                            }
                        }
                    }));
                }
                Err(err) => warn!(%collection, error = %err, "subscription not started"),
            }
        }
    }

    async fn retry_offline(&self, connectivity: &watch::Receiver<bool>) {
        if self.engine.state() != SyncState::Offline || !*connectivity.borrow() {
            return;
        }
        debug!("engine offline while the network is up; retrying");
        log_pass("retry", self.engine.set_online(true).await);
    }

    fn stop_forwarders(&mut self) {
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_pass(trigger: &str, result: SyncResult<Option<SyncReport>>) {
    match result {
        Ok(Some(report)) => debug!(trigger, summary = %report.summary(), "pass finished"),
        Ok(None) => {}
        Err(err) => warn!(trigger, error = %err, "pass failed"),
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.stop_forwarders();
    }
}
