//! Timers: one-shot resolution/cleanup jobs and the recurring daily digest
//!
//! Jobs are plain tokio tasks. Nothing is persisted, so pending jobs are
//! lost on restart (together with the in-memory registry they refer to).

use crate::config::DigestConfig;
use crate::digest;
use crate::lifecycle::{best_effort, ResolutionReport, ResolutionTask, SignalController};
use crate::stats::StatsStore;
use crate::transport::{ChatTransport, MessageHandle, OwnerId};
use chrono::{DateTime, Duration as ChronoDuration, Offset, TimeZone, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Delay between issuing a signal and revealing it; also the lifetime of busy warnings
pub const SIGNAL_DELAY: Duration = Duration::from_secs(90);

/// Run `job` once after `delay`. There is no cancellation.
pub fn run_after<F>(delay: Duration, job: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        job.await
    })
}

pub fn schedule_resolution(
    controller: Arc<SignalController>,
    task: ResolutionTask,
) -> JoinHandle<ResolutionReport> {
    debug!(owner = %task.signal.owner, "Resolution scheduled in {}s", SIGNAL_DELAY.as_secs());
    run_after(SIGNAL_DELAY, async move { controller.resolve(task).await })
}

pub fn schedule_delete(
    transport: Arc<dyn ChatTransport>,
    owner: OwnerId,
    message: MessageHandle,
    delay: Duration,
) -> JoinHandle<()> {
    run_after(delay, async move {
        let deleted = transport.delete_message(owner, message).await;
        best_effort("delete transient message", owner, deleted);
    })
}

/// Next digest fire time strictly after `now`
pub fn next_digest_at(now: DateTime<Utc>, config: &DigestConfig) -> Option<DateTime<Utc>> {
    let offset = config.offset().unwrap_or_else(|| Utc.fix());
    let local_now = now.with_timezone(&offset);

    let today = local_now.date_naive().and_hms_opt(config.hour, config.minute, 0)?;
    let mut next = offset.from_local_datetime(&today).single()?;
    if next <= local_now {
        next += ChronoDuration::days(1);
    }

    Some(next.with_timezone(&Utc))
}

/// Recurring once-a-day stats push
pub fn spawn_daily_digest(
    stats: Arc<StatsStore>,
    transport: Arc<dyn ChatTransport>,
    config: DigestConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_digest_at(now, &config) else {
                error!(
                    "Cannot compute digest time {:02}:{:02} - daily digest disabled",
                    config.hour, config.minute
                );
                return;
            };

            info!("Next daily digest at {}", next.format("%Y-%m-%d %H:%M UTC"));
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            let sent = digest::deliver_digest(&stats, transport.as_ref()).await;
            info!("Daily digest delivered to {} owner(s)", sent);
        }
    })
}
