//! Daily stats digest: drain the store, one summary message per owner

use crate::lifecycle::best_effort;
use crate::stats::{StatsStore, UserStats};
use crate::transport::ChatTransport;
use tracing::info;

pub fn format_digest(stats: &UserStats) -> String {
    format!(
        "📊 Daily Stats:\n✅ Wins: {}\n❌ Losses: {}",
        stats.wins, stats.losses
    )
}

/// Returns how many summaries were delivered. The store is emptied before
/// sending, so results recorded meanwhile count toward the next digest.
pub async fn deliver_digest(stats: &StatsStore, transport: &dyn ChatTransport) -> usize {
    let mut snapshot: Vec<_> = stats.drain().into_iter().collect();
    if snapshot.is_empty() {
        info!("Daily digest: no activity since last drain");
        return 0;
    }
    snapshot.sort_by_key(|(owner, _)| *owner);

    let mut sent = 0;
    for (owner, counters) in snapshot {
        if counters.total() == 0 {
            continue;
        }
        let delivered = transport.send_text(owner, &format_digest(&counters)).await;
        if best_effort("send digest", owner, delivered).is_some() {
            sent += 1;
        }
    }
    sent
}
