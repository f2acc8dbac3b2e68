use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tracker::{
    entities::{OpenSession, Session, TrackerConfig},
    store::SessionStore,
};

/// One-document backup of the whole tracker state.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub config: TrackerConfig,
    pub current: Option<OpenSession>,
    pub sessions: Vec<Session>,
}

pub async fn export_snapshot<S: SessionStore>(store: &S) -> Result<Snapshot> {
    let config = store.load_config().await?;
    let current = store.load_current().await?;
    let mut sessions = vec![];
    for date in store.list_dates().await? {
        sessions.extend(store.sessions_for(date).await?);
    }
    sessions.sort_by_key(|s| s.start);
    Ok(Snapshot {
        config,
        current,
        sessions,
    })
}

pub async fn import_snapshot<S: SessionStore>(store: &S, snapshot: Snapshot) -> Result<()> {
    store.save_config(&snapshot.config).await?;
    match &snapshot.current {
        Some(current) => store.save_current(current).await?,
        None => store.clear_current().await?,
    }
    for session in &snapshot.sessions {
        store.append_session(session).await?;
    }
    Ok(())
}

pub async fn process_export<S: SessionStore>(
    store: &S,
    out: Option<std::path::PathBuf>,
) -> Result<()> {
    let snapshot = export_snapshot(store).await?;
    let raw = serde_json::to_string_pretty(&snapshot)?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, raw).await?;
            println!(
                "Exported {} sessions to {}",
                snapshot.sessions.len(),
                path.display()
            );
        }
        None => println!("{raw}"),
    }
    Ok(())
}

pub async fn process_import<S: SessionStore>(store: &S, path: &Path, legacy: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Can't read snapshot at {}", path.display()))?;
    let snapshot = if legacy {
        parse_legacy(&raw)?
    } else {
        serde_json::from_str(&raw)?
    };
    let sessions = snapshot.sessions.len();
    let categories = snapshot.config.categories.len();
    import_snapshot(store, snapshot).await?;
    println!("Imported {sessions} sessions and {categories} categories");
    Ok(())
}

/// The old single-file format: ISO timestamps, end instead of duration, all
/// three parts in one document.
#[derive(Deserialize)]
struct LegacyData {
    #[serde(default)]
    sessions: Vec<LegacySession>,
    #[serde(default)]
    categories: Vec<Arc<str>>,
    #[serde(default)]
    current: Option<LegacySession>,
}

#[derive(Deserialize)]
struct LegacySession {
    category: Arc<str>,
    start: String,
    #[serde(default)]
    end: Option<String>,
}

/// Converts the legacy format into a [Snapshot]. Sessions without a parseable
/// start and end never finished and are dropped, like the original migration
/// did.
pub fn parse_legacy(raw: &str) -> Result<Snapshot> {
    let data: LegacyData = serde_json::from_str(raw)?;

    let mut sessions = vec![];
    for session in data.sessions {
        let start = parse_legacy_timestamp(&session.start);
        let end = session.end.as_deref().and_then(parse_legacy_timestamp);
        match (start, end) {
            (Some(start), Some(end)) if end >= start => sessions.push(Session {
                category: session.category,
                start,
                duration: end - start,
            }),
            _ => warn!(
                "Dropping incomplete legacy session of '{}'",
                session.category
            ),
        }
    }
    sessions.sort_by_key(|s| s.start);

    let current = data.current.and_then(|session| {
        parse_legacy_timestamp(&session.start).map(|start| OpenSession {
            category: session.category,
            start,
        })
    });

    let config = if data.categories.is_empty() {
        TrackerConfig::default()
    } else {
        TrackerConfig {
            categories: data.categories,
            ..TrackerConfig::default()
        }
    };

    Ok(Snapshot {
        config,
        current,
        sessions,
    })
}

fn parse_legacy_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|v| v.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::tracker::{
        entities::{OpenSession, Session},
        store::{JsonStore, SessionStore},
    };

    use super::{export_snapshot, import_snapshot, parse_legacy};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    #[tokio::test]
    async fn test_snapshot_roundtrip() -> Result<()> {
        let source_dir = tempdir()?;
        let source = JsonStore::new(source_dir.path().to_owned())?;

        let start = Utc.from_utc_datetime(&TEST_START_DATE);
        source
            .append_session(&Session {
                category: "programming".into(),
                start,
                duration: Duration::minutes(30),
            })
            .await?;
        source
            .append_session(&Session {
                category: "wasted".into(),
                start: start + Duration::days(1),
                duration: Duration::minutes(10),
            })
            .await?;
        source
            .save_current(&OpenSession {
                category: "programming".into(),
                start: start + Duration::days(2),
            })
            .await?;

        let snapshot = export_snapshot(&source).await?;
        assert_eq!(snapshot.sessions.len(), 2);

        let target_dir = tempdir()?;
        let target = JsonStore::new(target_dir.path().to_owned())?;
        import_snapshot(&target, snapshot).await?;

        assert_eq!(
            export_snapshot(&target).await?,
            export_snapshot(&source).await?
        );
        Ok(())
    }

    #[test]
    fn test_parse_legacy() -> Result<()> {
        let raw = r#"{
            "sessions": [
                {
                    "category": "programming",
                    "start": "2018-07-04T10:00:00+00:00",
                    "end": "2018-07-04T11:30:00+00:00"
                },
                {
                    "category": "wasted",
                    "start": "2018-07-04T12:00:00+00:00"
                }
            ],
            "categories": ["programming", "wasted", "stop"],
            "current": {
                "category": "programming",
                "start": "2018-07-05T09:00:00+00:00"
            }
        }"#;

        let snapshot = parse_legacy(raw)?;

        // the open-ended session is dropped
        assert_eq!(snapshot.sessions.len(), 1);
        assert_eq!(snapshot.sessions[0].category.as_ref(), "programming");
        assert_eq!(snapshot.sessions[0].duration, Duration::minutes(90));

        assert_eq!(snapshot.config.categories.len(), 3);
        assert_eq!(
            snapshot.current.as_ref().unwrap().category.as_ref(),
            "programming"
        );
        Ok(())
    }

    #[test]
    fn test_parse_legacy_empty_document() -> Result<()> {
        let snapshot = parse_legacy("{}")?;
        assert!(snapshot.sessions.is_empty());
        assert_eq!(snapshot.current, None);
        // falls back to the default category set
        assert!(!snapshot.config.categories.is_empty());
        Ok(())
    }
}
