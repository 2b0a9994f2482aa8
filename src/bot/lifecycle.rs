//! Signal lifecycle controller
//!
//! Per owner the controller walks `IDLE -> PENDING -> IDLE`:
//! - a request acquires the registry slot, generates the outcome, sends the
//!   "signal issued" card and schedules the resolution 90s later
//! - the resolution renders the WIN/CRASH card, counts the result, cleans up
//!   the issued message and releases the slot
//!
//! Every step after acquisition is best-effort. The registry slot is released
//! by a drop guard so no failure (or panic) in resolution can leave an owner
//! stuck in PENDING.

use crate::outcome::{self, social_proof_count};
use crate::registry::SignalRegistry;
use crate::render::{ImageRenderer, RenderError, TextColor};
use crate::scheduler::{self, SIGNAL_DELAY};
use crate::stats::{StatsStore, UserStats};
use crate::transport::{ChatTransport, MessageHandle, OwnerId, TransportError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const ISSUED_CAPTION: &str = "🔴 YOUR SIGNAL\n\n⏳ You have 1 minute to bet";
pub const BUSY_TEXT: &str = "⛔ Please wait for the current signal to finish.";

/// One in-flight round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub owner: OwnerId,
    pub odds: Decimal,
    pub is_win: bool,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    pub fn resolves_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(SIGNAL_DELAY.as_secs() as i64)
    }
}

/// Immutable payload handed to the scheduler for the delayed resolution
#[derive(Debug, Clone)]
pub struct ResolutionTask {
    pub signal: Signal,
    pub issued_message: MessageHandle,
    /// Other messages removed together with the issued card
    pub extra_messages: Vec<MessageHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub owner: OwnerId,
    pub is_win: bool,
    /// Owner's counters right after this result was recorded
    pub stats: UserStats,
    pub result_delivered: bool,
    pub messages_deleted: usize,
}

#[derive(Debug)]
pub struct IssuedSignal {
    pub signal: Signal,
    pub issued_message: MessageHandle,
    pub resolution: JoinHandle<ResolutionReport>,
}

#[derive(Debug)]
pub enum RequestOutcome {
    Issued(IssuedSignal),
    /// Owner already has a pending signal; a transient warning was (maybe) sent
    Busy {
        warning: Option<MessageHandle>,
        cleanup: Option<JoinHandle<()>>,
    },
    /// The issued card could not be delivered; the owner stays IDLE
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Idle,
    Pending,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Log a failed best-effort step and discard the error
pub fn best_effort<T, E: Display>(step: &'static str, owner: OwnerId, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%owner, step, error = %e, "best-effort step failed");
            None
        }
    }
}

pub fn result_caption(signal: &Signal, bystanders: u32) -> String {
    format!(
        "{}\n{}x\n📊 {} users placed their bets on this signal.",
        if signal.is_win { "🎉 WIN!✅" } else { "❌ LOSE!" },
        signal.odds,
        bystanders
    )
}

struct ReleaseOnDrop<'a> {
    registry: &'a SignalRegistry,
    owner: OwnerId,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.registry.release(self.owner);
    }
}

pub struct SignalController {
    registry: Arc<SignalRegistry>,
    stats: Arc<StatsStore>,
    transport: Arc<dyn ChatTransport>,
    renderer: Arc<dyn ImageRenderer>,
}

impl SignalController {
    pub fn new(
        registry: Arc<SignalRegistry>,
        stats: Arc<StatsStore>,
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<dyn ImageRenderer>,
    ) -> Self {
        Self {
            registry,
            stats,
            transport,
            renderer,
        }
    }

    pub fn registry(&self) -> &Arc<SignalRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<StatsStore> {
        &self.stats
    }

    pub fn state(&self, owner: OwnerId) -> SignalState {
        if self.registry.is_active(owner) {
            SignalState::Pending
        } else {
            SignalState::Idle
        }
    }

    /// IDLE -> PENDING, or a busy warning if the owner is already PENDING.
    ///
    /// `request_message` is the user's inbound message when it should be
    /// cleaned up together with the issued card.
    pub async fn handle_request(
        self: &Arc<Self>,
        owner: OwnerId,
        request_message: Option<MessageHandle>,
    ) -> RequestOutcome {
        if !self.registry.try_acquire(owner) {
            return self.reject_busy(owner).await;
        }

        let drawn = outcome::generate(&mut rand::thread_rng());
        let signal = Signal {
            owner,
            odds: drawn.odds,
            is_win: drawn.is_win,
            created_at: Utc::now(),
        };
        info!(
            %owner,
            odds = %signal.odds,
            is_win = signal.is_win,
            resolves_at = %signal.resolves_at().format("%H:%M:%S UTC"),
            "Signal issued"
        );

        let issued_message = match self.issue(&signal).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(%owner, error = %e, "Failed to deliver signal - releasing owner");
                self.registry.release(owner);
                return RequestOutcome::Failed;
            }
        };

        let task = ResolutionTask {
            signal: signal.clone(),
            issued_message,
            extra_messages: request_message.into_iter().collect(),
        };
        let resolution = scheduler::schedule_resolution(Arc::clone(self), task);

        RequestOutcome::Issued(IssuedSignal {
            signal,
            issued_message,
            resolution,
        })
    }

    /// PENDING -> IDLE. Runs when the resolution timer fires.
    pub async fn resolve(&self, task: ResolutionTask) -> ResolutionReport {
        let ResolutionTask {
            signal,
            issued_message,
            extra_messages,
        } = task;
        let owner = signal.owner;
        let release = ReleaseOnDrop {
            registry: &self.registry,
            owner,
        };

        let (text, color) = if signal.is_win {
            ("WIN", TextColor::Green)
        } else {
            ("CRASH", TextColor::Red)
        };
        let image = best_effort(
            "render result",
            owner,
            self.render_card(text.to_string(), color).await,
        );

        let stats = self.stats.record(owner, signal.is_win);

        let mut messages_deleted = 0;
        for message in std::iter::once(issued_message).chain(extra_messages) {
            let deleted = self.transport.delete_message(owner, message).await;
            if best_effort("delete message", owner, deleted).is_some() {
                messages_deleted += 1;
            }
        }

        let result_delivered = match image {
            Some(image) => {
                let caption = result_caption(&signal, social_proof_count(&mut rand::thread_rng()));
                let sent = self.transport.send_photo(owner, image, &caption).await;
                best_effort("send result", owner, sent).is_some()
            }
            None => false,
        };

        drop(release);
        info!(
            %owner,
            is_win = signal.is_win,
            wins = stats.wins,
            losses = stats.losses,
            result_delivered,
            "Signal resolved"
        );

        ResolutionReport {
            owner,
            is_win: signal.is_win,
            stats,
            result_delivered,
            messages_deleted,
        }
    }

    async fn issue(&self, signal: &Signal) -> Result<MessageHandle, DeliveryError> {
        let image = self
            .render_card(format!("{}x", signal.odds), TextColor::White)
            .await?;
        let handle = self
            .transport
            .send_photo(signal.owner, image, ISSUED_CAPTION)
            .await?;
        debug!(owner = %signal.owner, message = %handle, "Signal card sent");
        Ok(handle)
    }

    async fn reject_busy(&self, owner: OwnerId) -> RequestOutcome {
        info!(%owner, "Signal already pending - rejecting request");

        let sent = self.transport.send_text(owner, BUSY_TEXT).await;
        let warning = best_effort("send busy warning", owner, sent);
        let cleanup = warning.map(|message| {
            scheduler::schedule_delete(Arc::clone(&self.transport), owner, message, SIGNAL_DELAY)
        });

        RequestOutcome::Busy { warning, cleanup }
    }

    /// Rendering is CPU-bound, keep it off the async workers
    async fn render_card(&self, text: String, color: TextColor) -> Result<Vec<u8>, RenderError> {
        let renderer = Arc::clone(&self.renderer);
        tokio::task::spawn_blocking(move || renderer.render(&text, color))
            .await
            .map_err(|e| RenderError::Worker(e.to_string()))?
    }
}
