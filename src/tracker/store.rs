use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::PathBuf,
};

use anyhow::Result;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::{date_to_record_name, record_name_to_date};

use super::entities::{OpenSession, Session, TrackerConfig};

/// Interface for abstracting persistence of the tracker state.
/// The state has three parts: the category set, the current-session register,
/// and the append-only log of closed sessions keyed by their start day.
pub trait SessionStore {
    fn load_config(&self) -> impl Future<Output = Result<TrackerConfig>> + Send;

    fn save_config(&self, config: &TrackerConfig) -> impl Future<Output = Result<()>> + Send;

    fn load_current(&self) -> impl Future<Output = Result<Option<OpenSession>>> + Send;

    fn save_current(&self, session: &OpenSession) -> impl Future<Output = Result<()>> + Send;

    fn clear_current(&self) -> impl Future<Output = Result<()>> + Send;

    /// Appends a closed session to the record file of its start day.
    fn append_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Retrieves closed sessions that started on a certain day.
    fn sessions_for(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<Session>>> + Send;

    /// Lists days that have at least one closed session, ascending.
    fn list_dates(&self) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send;
}

impl<T: Deref + Sync> SessionStore for T
where
    T::Target: SessionStore + Sync,
{
    fn load_config(&self) -> impl Future<Output = Result<TrackerConfig>> + Send {
        self.deref().load_config()
    }

    fn save_config(&self, config: &TrackerConfig) -> impl Future<Output = Result<()>> + Send {
        self.deref().save_config(config)
    }

    fn load_current(&self) -> impl Future<Output = Result<Option<OpenSession>>> + Send {
        self.deref().load_current()
    }

    fn save_current(&self, session: &OpenSession) -> impl Future<Output = Result<()>> + Send {
        self.deref().save_current(session)
    }

    fn clear_current(&self) -> impl Future<Output = Result<()>> + Send {
        self.deref().clear_current()
    }

    fn append_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send {
        self.deref().append_session(session)
    }

    fn sessions_for(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<Session>>> + Send {
        self.deref().sessions_for(date)
    }

    fn list_dates(&self) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send {
        self.deref().list_dates()
    }
}

/// The main realization of [SessionStore]. Keeps everything as JSON files
/// under a single data directory:
///  - `config.json` with the category set
///  - `current.json` with the open register, absent when stopped
///  - `records/<YYYY-MM-DD>` with one closed session per line
pub struct JsonStore {
    data_dir: PathBuf,
    record_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, std::io::Error> {
        let record_dir = data_dir.join("records");
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self {
            data_dir,
            record_dir,
        })
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    fn current_path(&self) -> PathBuf {
        self.data_dir.join("current.json")
    }

    fn record_path(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_record_name(date))
    }

    async fn read_sessions_inner(&self, date: NaiveDate) -> Result<Vec<Session>> {
        let path = self.record_path(date);

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        debug!("Extracting {path:?}");
        file.lock_shared()?;
        let buffer = BufReader::new(file);
        let mut lines = buffer.lines();
        let mut sessions = vec![];
        while let Ok(Some(v)) = lines.next_line().await {
            match serde_json::from_str::<Session>(&v) {
                Ok(v) => sessions.push(v),
                Err(e) => {
                    // ignore illegal values. Might happen after shutdowns
                    warn!(
                        "During parsing in path {:?} found illegal json string {}:  {e}",
                        path, &v
                    )
                }
            }
        }

        lines.into_inner().into_inner().unlock_async().await?;

        Ok(sessions)
    }
}

impl SessionStore for JsonStore {
    async fn load_config(&self) -> Result<TrackerConfig> {
        match tokio::fs::read(self.config_path()).await {
            Ok(raw) => match serde_json::from_slice::<TrackerConfig>(&raw) {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!("Config file is corrupted, falling back to defaults: {e}");
                    let config = TrackerConfig::default();
                    self.save_config(&config).await?;
                    Ok(config)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let config = TrackerConfig::default();
                self.save_config(&config).await?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_config(&self, config: &TrackerConfig) -> Result<()> {
        let raw = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(self.config_path(), raw).await?;
        Ok(())
    }

    async fn load_current(&self) -> Result<Option<OpenSession>> {
        match tokio::fs::read(self.current_path()).await {
            Ok(raw) => match serde_json::from_slice::<OpenSession>(&raw) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    // Might happen due to shutdown cutting off the write.
                    warn!("Current-session register was corrupted {e}");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_current(&self, session: &OpenSession) -> Result<()> {
        let raw = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(self.current_path(), raw).await?;
        Ok(())
    }

    async fn clear_current(&self) -> Result<()> {
        match tokio::fs::remove_file(self.current_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_session(&self, session: &Session) -> Result<()> {
        let path = self.record_path(session.start.date_naive());

        let mut file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .await?;

        let mut buffer = serde_json::to_vec(session)?;
        buffer.push(b'\n');

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = async {
            file.write_all(&buffer).await?;
            file.flush().await?;
            Ok(())
        }
        .await;
        file.unlock_async().await?;
        result
    }

    async fn sessions_for(&self, date: NaiveDate) -> Result<Vec<Session>> {
        self.read_sessions_inner(date).await
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = vec![];
        let mut entries = tokio::fs::read_dir(&self.record_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match record_name_to_date(&name.to_string_lossy()) {
                Some(date) => dates.push(date),
                None => warn!("Unexpected file in record directory: {name:?}"),
            }
        }
        dates.sort();
        Ok(dates)
    }
}
