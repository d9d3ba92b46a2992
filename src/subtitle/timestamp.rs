use std::fmt;
use std::time::Duration;

/// A subtitle timestamp with millisecond resolution.
///
/// SRT does not bound the hour field, so the total may exceed 24 hours.
/// Hours above 99 are formatted with their full digit count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    millis: u64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { millis: 0 };

    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn from_parts(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Self {
        Self {
            millis: ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis,
        }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    /// Elapsed time from `other` to `self`, clamped at zero.
    pub fn saturating_sub(&self, other: Timestamp) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(other.millis))
    }

    /// Parse `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`). Hours take one or more
    /// digits; minutes and seconds exactly two; milliseconds exactly three.
    pub fn parse(s: &str) -> Option<Self> {
        let mut fields = s.split(':');
        let hours = fields.next()?;
        let minutes = fields.next()?;
        let rest = fields.next()?;
        if fields.next().is_some() {
            return None;
        }

        let (seconds, millis) = rest
            .split_once(',')
            .or_else(|| rest.split_once('.'))?;

        if hours.is_empty()
            || minutes.len() != 2
            || seconds.len() != 2
            || millis.len() != 3
        {
            return None;
        }

        let digits = |field: &str| -> Option<u64> {
            if field.chars().all(|c| c.is_ascii_digit()) {
                field.parse().ok()
            } else {
                None
            }
        };

        Some(Self::from_parts(
            digits(hours)?,
            digits(minutes)?,
            digits(seconds)?,
            digits(millis)?,
        ))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.millis / 1000;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        let millis = self.millis % 1000;
        write!(f, "{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl From<Duration> for Timestamp {
    fn from(d: Duration) -> Self {
        Self::from_millis(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(Timestamp::from_millis(1500).to_string(), "00:00:01,500");
        assert_eq!(
            Timestamp::from_parts(1, 1, 1, 123).to_string(),
            "01:01:01,123"
        );
    }

    #[test]
    fn test_format_hours_over_99() {
        assert_eq!(
            Timestamp::from_parts(100, 0, 0, 0).to_string(),
            "100:00:00,000"
        );
        assert_eq!(
            Timestamp::from_parts(123, 59, 59, 999).to_string(),
            "123:59:59,999"
        );
    }

    #[test]
    fn test_parse_comma_and_dot() {
        assert_eq!(
            Timestamp::parse("00:00:01,500"),
            Some(Timestamp::from_millis(1500))
        );
        assert_eq!(
            Timestamp::parse("00:00:01.500"),
            Some(Timestamp::from_millis(1500))
        );
    }

    #[test]
    fn test_parse_single_digit_hours() {
        assert_eq!(
            Timestamp::parse("1:02:03,004"),
            Some(Timestamp::from_parts(1, 2, 3, 4))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Timestamp::parse("00:00:01"), None);
        assert_eq!(Timestamp::parse("00:0:01,500"), None);
        assert_eq!(Timestamp::parse("00:00:01,50"), None);
        assert_eq!(Timestamp::parse("00:00:01,5000"), None);
        assert_eq!(Timestamp::parse("aa:00:01,500"), None);
        assert_eq!(Timestamp::parse(""), None);
    }

    #[test]
    fn test_roundtrip() {
        for ms in [0u64, 1, 999, 1000, 3_599_999, 3_600_000, 359_999_999] {
            let ts = Timestamp::from_millis(ms);
            assert_eq!(Timestamp::parse(&ts.to_string()), Some(ts));
        }
    }

    #[test]
    fn test_ordering() {
        assert!(Timestamp::from_millis(1000) < Timestamp::from_millis(1001));
        assert_eq!(Timestamp::from_millis(500), Timestamp::from_parts(0, 0, 0, 500));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Timestamp::from_millis(3500);
        let b = Timestamp::from_millis(3000);
        assert_eq!(a.saturating_sub(b), Duration::from_millis(500));
        assert_eq!(b.saturating_sub(a), Duration::ZERO);
    }
}
