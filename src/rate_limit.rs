use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::net::IpAddr;

// Rate limit entry - tracks requests per client IP
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { reset_at: DateTime<Utc> },
}

/// Fixed-window quota per client IP, held in memory for the process lifetime.
///
/// Counts are not shared between processes, so running several instances
/// multiplies the effective limit.
pub struct RateLimiter {
    entries: DashMap<IpAddr, RateLimitEntry>,
    limit: u32,
    window: TimeDelta,
}

impl RateLimiter {
    pub fn new(limit: u32, window: TimeDelta) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn check(&self, ip: IpAddr) -> RateDecision {
        self.check_at(ip, Utc::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: DateTime<Utc>) -> RateDecision {
        // drop expired windows, so an expired client starts over with a fresh entry
        self.entries.retain(|_, entry| entry.reset_at >= now);

        // shard lock is held until `entry` drops, so check and increment are atomic per IP
        let mut entry = self.entries.entry(ip).or_insert_with(|| RateLimitEntry {
            count: 0,
            reset_at: now
                .checked_add_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        });

        if entry.count >= self.limit {
            return RateDecision::Limited {
                reset_at: entry.reset_at,
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.limit - entry.count,
        }
    }

    // Number of clients with a live window
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}
