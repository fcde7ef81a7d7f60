use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// User settings, read from `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// The markdown file holding the tasks. Unset until the user picks one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_path: Option<PathBuf>,
    /// Local time of day at which due-date reminders fire.
    #[serde(default)]
    pub notification_time: FireTime,
    #[serde(default)]
    pub features: Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default = "default_true")]
    pub notifications: bool,
    /// When off, recurring tasks toggle like plain ones (no rollover).
    #[serde(default = "default_true")]
    pub recurring: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            notifications: true,
            recurring: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A daily `HH:MM` wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FireTime {
    pub hour: u32,
    pub minute: u32,
}

impl FireTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        FireTime {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    /// Parse `HH:MM` (exactly two digits each). Out-of-range components are
    /// clamped to 23:59.
    pub fn parse(s: &str) -> Option<FireTime> {
        let (h, m) = s.split_once(':')?;
        let two_digits = |p: &str| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return None;
        }
        Some(FireTime::new(h.parse().ok()?, m.parse().ok()?))
    }

    /// Like [`FireTime::parse`], falling back to midnight.
    pub fn parse_lenient(s: &str) -> FireTime {
        FireTime::parse(s).unwrap_or_default()
    }

    pub fn as_naive_time(self) -> chrono::NaiveTime {
        chrono::NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default()
    }
}

impl fmt::Display for FireTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for FireTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FireTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FireTime::parse_lenient(&raw))
    }
}
