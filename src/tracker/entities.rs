use chrono::Duration;
use chrono::Utc;

use chrono::DateTime;
use serde::Deserialize;
use serde::Serialize;

use std::sync::Arc;

/// Sentinel category. Starting it only closes the open session and never
/// opens a new register.
pub const STOP_CATEGORY: &str = "stop";

const CONFIG_VERSION: u32 = 2;

/// A closed session as stored on the disk. Only the start and the duration
/// are saved. The end of a session is always derivable, and an integer
/// duration keeps record lines short.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub category: Arc<str>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "duration_ser")]
    pub duration: Duration,
}

impl Session {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        let duration = Duration::seconds(s);
        Ok(duration)
    }
}

/// The current-session register. At most one of these exists at a time, and
/// it has no end until it is closed.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct OpenSession {
    pub category: Arc<str>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
}

impl OpenSession {
    /// Closes the register into an appendable [Session].
    pub fn close(self, end: DateTime<Utc>) -> Session {
        Session {
            duration: end - self.start,
            category: self.category,
            start: self.start,
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.start
    }
}

/// User-editable category set. The set never becomes empty.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct TrackerConfig {
    pub categories: Vec<Arc<str>>,
    pub version: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                "programming".into(),
                "wasted".into(),
                STOP_CATEGORY.into(),
            ],
            version: CONFIG_VERSION,
        }
    }
}

impl TrackerConfig {
    /// Returns the interned name when the category is known.
    pub fn find(&self, category: &str) -> Option<&Arc<str>> {
        self.categories.iter().find(|c| c.as_ref() == category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.find(category).is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use super::{OpenSession, TrackerConfig, STOP_CATEGORY};

    const TEST_START: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(), NaiveTime::MIN);

    #[test]
    fn test_close_open_session() {
        let start = Utc.from_utc_datetime(&TEST_START);
        let open = OpenSession {
            category: "programming".into(),
            start,
        };
        let session = open.close(start + Duration::minutes(90));
        assert_eq!(session.duration, Duration::minutes(90));
        assert_eq!(session.end(), start + Duration::minutes(90));
    }

    #[test]
    fn test_default_config_has_sentinel() {
        let config = TrackerConfig::default();
        assert!(config.contains(STOP_CATEGORY));
        assert!(config.contains("programming"));
        assert!(!config.contains("unknown"));
    }
}
