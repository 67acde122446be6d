pub mod odds;
pub mod schedule;

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::config::RateLimitConfig;

pub(crate) type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub(crate) fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    // A zero setting falls back to one request per second, no burst
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Club-form suffixes and prefixes providers add or drop ("Chelsea FC").
const CLUB_AFFIXES: [&str; 4] = ["fc", "cf", "afc", "sc"];

fn team_tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty() && !CLUB_AFFIXES.contains(&t.as_str()))
        .collect()
}

/// Team-name match across providers. Names are compared token for token
/// after dropping club affixes, so "Chelsea" matches "Chelsea FC" while
/// "United" does not match "Newcastle United".
pub(crate) fn same_team(a: &str, b: &str) -> bool {
    let a = team_tokens(a);
    !a.is_empty() && a == team_tokens(b)
}
