//! The session-tracking state machine and its persistence.
//! The basic idea is:
//!  - At most one session is open at any time.
//!  - Starting a session implicitly closes the previous one.
//!  - Closed sessions are append-only, stored per start day.

pub mod entities;
pub mod stats;
pub mod store;

use anyhow::{bail, Result};
use chrono::Duration;
use entities::{OpenSession, Session, TrackerConfig, STOP_CATEGORY};
use store::SessionStore;

use crate::utils::clock::Clock;

/// What [Tracker::start] did with the register.
#[derive(Debug, PartialEq)]
pub enum StartOutcome {
    /// A new session is now open. `previous` is the session that had to be
    /// closed to make room for it.
    Started { previous: Option<Session> },
    /// The sentinel category was requested, so the register is now empty.
    Stopped { previous: Option<Session> },
}

/// Owns the current-session register and the category set, and mediates all
/// reads, updates and appends against a [SessionStore].
pub struct Tracker<S> {
    store: S,
    config: TrackerConfig,
    current: Option<OpenSession>,
    clock: Box<dyn Clock>,
}

impl<S: SessionStore> Tracker<S> {
    /// Loads tracker state from the store. An open session left behind by a
    /// previous process is kept, which is what lets `start` and `stop` run as
    /// separate one-shot invocations.
    pub async fn load(store: S, clock: Box<dyn Clock>) -> Result<Self> {
        let config = store.load_config().await?;
        let current = store.load_current().await?;
        Ok(Self {
            store,
            config,
            current,
            clock,
        })
    }

    pub fn categories(&self) -> &[std::sync::Arc<str>] {
        &self.config.categories
    }

    pub fn current(&self) -> Option<&OpenSession> {
        self.current.as_ref()
    }

    pub fn current_duration(&self) -> Option<Duration> {
        self.current
            .as_ref()
            .map(|open| open.elapsed(self.clock.time()))
    }

    /// Adds a category. Returns false without touching the disk when the
    /// category already exists.
    pub async fn add_category(&mut self, category: &str) -> Result<bool> {
        if self.config.contains(category) {
            return Ok(false);
        }
        self.config.categories.push(category.into());
        self.store.save_config(&self.config).await?;
        Ok(true)
    }

    /// Removes a category. Refuses to remove the last remaining one or a
    /// category that was never there. History referring to the removed
    /// category is left untouched.
    pub async fn remove_category(&mut self, category: &str) -> Result<bool> {
        if !self.config.contains(category) || self.config.categories.len() <= 1 {
            return Ok(false);
        }
        self.config.categories.retain(|c| c.as_ref() != category);
        self.store.save_config(&self.config).await?;
        Ok(true)
    }

    /// Starts a session of the given category, closing the open one first.
    /// The sentinel category only closes.
    pub async fn start(&mut self, category: &str) -> Result<StartOutcome> {
        let Some(interned) = self.config.find(category).cloned() else {
            bail!(
                "unknown category '{category}'. Available categories: {}",
                self.config
                    .categories
                    .iter()
                    .map(|c| c.as_ref())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        };

        let previous = self.stop().await?;

        if interned.as_ref() == STOP_CATEGORY {
            return Ok(StartOutcome::Stopped { previous });
        }

        let session = OpenSession {
            category: interned,
            start: self.clock.time(),
        };
        self.store.save_current(&session).await?;
        self.current = Some(session);
        Ok(StartOutcome::Started { previous })
    }

    /// Closes the open session and appends it to the log. Returns the closed
    /// session, or None when the register was already empty.
    pub async fn stop(&mut self) -> Result<Option<Session>> {
        let Some(open) = self.current.take() else {
            return Ok(None);
        };
        let closed = open.close(self.clock.time());
        self.store.append_session(&closed).await?;
        self.store.clear_current().await?;
        Ok(Some(closed))
    }

    /// All closed sessions in start order, optionally only the trailing
    /// `limit`.
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<Session>> {
        let mut sessions = vec![];
        for date in self.store.list_dates().await? {
            sessions.extend(self.store.sessions_for(date).await?);
        }
        sessions.sort_by_key(|s| s.start);
        if let Some(limit) = limit {
            let skip = sessions.len().saturating_sub(limit);
            sessions.drain(..skip);
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration as StdDuration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::time::Instant;

    use crate::{
        tracker::{
            entities::STOP_CATEGORY,
            store::JsonStore,
            StartOutcome, Tracker,
        },
        utils::clock::Clock,
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    /// Clock that only moves when told to.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    #[async_trait]
    impl Clock for &'static ManualClock {
        fn time(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: StdDuration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    fn leaked_clock() -> &'static ManualClock {
        Box::leak(Box::new(ManualClock::starting_at(
            Utc.from_utc_datetime(&TEST_START_DATE),
        )))
    }

    #[tokio::test]
    async fn test_start_switch_stop() -> Result<()> {
        let dir = tempdir()?;
        let clock = leaked_clock();
        let store = JsonStore::new(dir.path().to_owned())?;
        let mut tracker = Tracker::load(store, Box::new(clock)).await?;

        assert!(tracker.categories().iter().any(|c| c.as_ref() == "programming"));

        assert_eq!(
            tracker.start("programming").await?,
            StartOutcome::Started { previous: None }
        );
        assert_eq!(tracker.current().unwrap().category.as_ref(), "programming");

        clock.advance(Duration::minutes(30));

        // switching closes the previous session
        let outcome = tracker.start("wasted").await?;
        let StartOutcome::Started {
            previous: Some(previous),
        } = outcome
        else {
            panic!("expected a closed previous session, got {outcome:?}");
        };
        assert_eq!(previous.category.as_ref(), "programming");
        assert_eq!(previous.duration, Duration::minutes(30));

        clock.advance(Duration::minutes(10));

        let stopped = tracker.stop().await?.unwrap();
        assert_eq!(stopped.category.as_ref(), "wasted");
        assert_eq!(stopped.duration, Duration::minutes(10));
        assert_eq!(tracker.current(), None);

        assert_eq!(tracker.stop().await?, None);

        let history = tracker.history(None).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].category.as_ref(), "programming");
        assert_eq!(history[1].category.as_ref(), "wasted");
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_sentinel_only_closes() -> Result<()> {
        let dir = tempdir()?;
        let clock = leaked_clock();
        let store = JsonStore::new(dir.path().to_owned())?;
        let mut tracker = Tracker::load(store, Box::new(clock)).await?;

        tracker.start("programming").await?;
        clock.advance(Duration::minutes(5));

        let outcome = tracker.start(STOP_CATEGORY).await?;
        assert!(matches!(
            outcome,
            StartOutcome::Stopped { previous: Some(_) }
        ));
        assert_eq!(tracker.current(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_category_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStore::new(dir.path().to_owned())?;
        let mut tracker = Tracker::load(store, Box::new(leaked_clock())).await?;

        tracker.start("programming").await?;
        let error = tracker.start("sleeping").await.unwrap_err();
        assert!(error.to_string().contains("sleeping"));
        // the register is untouched by a failed start
        assert_eq!(tracker.current().unwrap().category.as_ref(), "programming");
        Ok(())
    }

    #[tokio::test]
    async fn test_category_editing() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonStore::new(dir.path().to_owned())?;
        let mut tracker = Tracker::load(store, Box::new(leaked_clock())).await?;

        assert!(tracker.add_category("reading").await?);
        assert!(!tracker.add_category("reading").await?);
        assert!(tracker.categories().iter().any(|c| c.as_ref() == "reading"));

        assert!(tracker.remove_category("reading").await?);
        assert!(!tracker.remove_category("reading").await?);

        // the set never becomes empty
        for category in ["programming", "wasted"] {
            assert!(tracker.remove_category(category).await?);
        }
        assert!(!tracker.remove_category(STOP_CATEGORY).await?);
        assert_eq!(tracker.categories().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_session_survives_reload() -> Result<()> {
        let dir = tempdir()?;
        let clock = leaked_clock();

        {
            let store = JsonStore::new(dir.path().to_owned())?;
            let mut tracker = Tracker::load(store, Box::new(clock)).await?;
            tracker.start("programming").await?;
        }

        clock.advance(Duration::minutes(45));

        let store = JsonStore::new(dir.path().to_owned())?;
        let mut tracker = Tracker::load(store, Box::new(clock)).await?;
        assert_eq!(tracker.current().unwrap().category.as_ref(), "programming");
        assert_eq!(tracker.current_duration(), Some(Duration::minutes(45)));

        let stopped = tracker.stop().await?.unwrap();
        assert_eq!(stopped.duration, Duration::minutes(45));
        Ok(())
    }

    #[tokio::test]
    async fn test_history_limit() -> Result<()> {
        let dir = tempdir()?;
        let clock = leaked_clock();
        let store = JsonStore::new(dir.path().to_owned())?;
        let mut tracker = Tracker::load(store, Box::new(clock)).await?;

        for _ in 0..5 {
            tracker.start("programming").await?;
            clock.advance(Duration::minutes(1));
        }
        tracker.stop().await?;

        let limited = tracker.history(Some(2)).await?;
        assert_eq!(limited.len(), 2);
        let all = tracker.history(None).await?;
        assert_eq!(all.len(), 5);
        assert_eq!(limited, &all[3..]);
        Ok(())
    }
}
