//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "PoolWatch";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path appended to the server address for the realtime websocket.
pub const WS_PATH: &str = "/ws";

/// Default base reconnect delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Default multiplier applied to the reconnect delay after each failed attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default ceiling for the random jitter added to each reconnect delay, in
/// milliseconds.
pub const DEFAULT_JITTER_MS: u64 = 1_000;

/// Default maximum reconnect delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default number of consecutive failed reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default websocket handshake timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default capacity of each subscription's payload buffer.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 64;

/// Well-known channel names served by the dashboard feed.
pub mod channels {
    /// Share submissions and hashrate updates.
    pub const MINING: &str = "mining";
    /// Block candidates and confirmations.
    pub const BLOCKS: &str = "blocks";
    /// Payout batches and balance changes.
    pub const PAYOUTS: &str = "payouts";
    /// Worker online/offline transitions.
    pub const WORKERS: &str = "workers";

    /// Channels the CLI tails when none are given.
    pub const DEFAULT_TAIL: &[&str] = &[MINING, BLOCKS];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tail_channels() {
        assert_eq!(channels::DEFAULT_TAIL.len(), 2);
        assert!(channels::DEFAULT_TAIL.contains(&"mining"));
    }

    #[test]
    fn test_backoff_defaults_are_sane() {
        assert!(DEFAULT_BASE_DELAY_MS <= DEFAULT_MAX_DELAY_MS);
        assert!(DEFAULT_BACKOFF_MULTIPLIER >= 1.0);
    }
}
