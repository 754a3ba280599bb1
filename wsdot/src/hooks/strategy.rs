//! Cache policies per strategy.

use std::time::{Duration, Instant};

use wsdot_define::CacheStrategy;

/// How long `REALTIME` data stays fresh.
pub const REALTIME_STALE_TIME: Duration = Duration::from_secs(5);

/// How often each API's cache flush date is polled.
pub const FLUSH_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// How long an entry no handle observes is kept before eviction.
pub const GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Freshness rules applied to cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Age after which data is stale; `None` means never by age alone.
    pub stale_time: Option<Duration>,
    /// Whether a change in the API's cache flush date invalidates the data.
    pub follows_flush_date: bool,
}

const POLICIES: [(CacheStrategy, CachePolicy); 2] = [
    (
        CacheStrategy::Static,
        CachePolicy {
            stale_time: None,
            follows_flush_date: true,
        },
    ),
    (
        CacheStrategy::Realtime,
        CachePolicy {
            stale_time: Some(REALTIME_STALE_TIME),
            follows_flush_date: false,
        },
    ),
];

impl CachePolicy {
    /// Looks up the policy for `strategy`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use wsdot::hooks::CachePolicy;
    /// use wsdot_define::CacheStrategy;
    ///
    /// assert!(CachePolicy::for_strategy(CacheStrategy::Static).follows_flush_date);
    /// assert!(CachePolicy::for_strategy(CacheStrategy::Realtime).stale_time.is_some());
    /// ```
    pub fn for_strategy(strategy: CacheStrategy) -> Self {
        POLICIES
            .iter()
            .find(|(s, _)| *s == strategy)
            .map(|(_, policy)| *policy)
            .unwrap_or(POLICIES[0].1)
    }

    /// Returns `true` if data written at `updated_at` is stale at `now`.
    pub fn is_stale(&self, updated_at: Instant, now: Instant) -> bool {
        self.stale_time
            .is_some_and(|limit| now.saturating_duration_since(updated_at) >= limit)
    }
}
