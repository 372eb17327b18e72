//! Uptime breakdown

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::MessageFormatter;

/// Elapsed time split into days, hours, minutes and seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Uptime {
    /// Break `elapsed` down, dropping sub-second precision
    pub fn from_duration(elapsed: Duration) -> Self {
        let total = elapsed.as_secs();
        Self {
            days: total / 86_400,
            hours: total / 3_600 % 24,
            minutes: total / 60 % 60,
            seconds: total % 60,
        }
    }

    /// Render through the `uptime.format` message key
    pub fn render(&self, formatter: &dyn MessageFormatter) -> String {
        formatter.format(
            "uptime.format",
            &[&self.days, &self.hours, &self.minutes, &self.seconds],
        )
    }
}

impl From<Duration> for Uptime {
    fn from(elapsed: Duration) -> Self {
        Self::from_duration(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::MessageCatalog;

    #[test]
    fn test_breakdown() {
        let uptime = Uptime::from_duration(Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5));
        assert_eq!(
            uptime,
            Uptime {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5
            }
        );
    }

    #[test]
    fn test_sub_second_dropped() {
        let uptime = Uptime::from_duration(Duration::from_millis(59_999));
        assert_eq!(uptime.seconds, 59);
        assert_eq!(uptime.minutes, 0);
    }

    #[test]
    fn test_render() {
        let catalog = MessageCatalog::default();
        let uptime = Uptime::from_duration(Duration::from_secs(90_061));
        assert_eq!(uptime.render(&catalog), "1d 1h 1m 1s");
    }
}
