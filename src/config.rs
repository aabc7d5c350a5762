use std::time::Duration;

pub const EXPIRY_INTERVAL_VAR: &str = "CLUB_EXPIRY_INTERVAL_SECS";
pub const UNPAID_TIMEOUT_VAR: &str = "CLUB_UNPAID_TIMEOUT_SECS";
pub const REMINDER_INTERVAL_VAR: &str = "CLUB_REMINDER_INTERVAL_SECS";

/// Timing of the background sweeper
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweeperConfig {
    /// How often unpaid bookings are looked for
    pub expiry_interval: Duration,
    /// Age after which an unpaid booking is cancelled
    pub unpaid_timeout: Duration,
    /// How often reminders for tomorrow are sent
    pub reminder_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            expiry_interval: Duration::from_secs(60),
            unpaid_timeout: Duration::from_secs(5 * 60),
            reminder_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl SweeperConfig {
    /// Read the config from `CLUB_*_SECS` environment variables
    ///
    /// Missing, unparsable or zero values keep their default.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let seconds = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            expiry_interval: seconds(EXPIRY_INTERVAL_VAR, defaults.expiry_interval),
            unpaid_timeout: seconds(UNPAID_TIMEOUT_VAR, defaults.unpaid_timeout),
            reminder_interval: seconds(REMINDER_INTERVAL_VAR, defaults.reminder_interval),
        }
    }
}
