use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use crate::utils::time::format_hhmm;

use super::poll::StatusEvent;

/// Represents a publisher of status snapshots. This should realistically be
/// able to abstract over different outputs: a status file, a notification, a
/// remote endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSink {
    async fn publish(&mut self, event: StatusEvent) -> Result<()>;

    async fn finalize(&mut self) -> Result<()>;
}

/// The single line external presentation shells poll for.
pub fn status_line(event: &StatusEvent) -> String {
    match &event.current {
        Some(open) => format!("{} ({})", open.category, format_hhmm(open.elapsed(event.at))),
        None => "no active session".into(),
    }
}

/// Writes the status line into a file inside the data directory. The write
/// goes through a sibling temp file and a rename so that a reader never
/// observes a half-written line.
pub struct FileStatusSink {
    path: PathBuf,
}

impl FileStatusSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl StatusSink for FileStatusSink {
    async fn publish(&mut self, event: StatusEvent) -> Result<()> {
        let mut line = status_line(&event);
        line.push('\n');

        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, line).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives status snapshots and renders them using a sink.
pub struct RenderModule<Sink> {
    receiver: Receiver<StatusEvent>,
    sink: Sink,
}

impl<S: StatusSink> RenderModule<S> {
    pub fn new(receiver: Receiver<StatusEvent>, sink: S) -> Self {
        Self { receiver, sink }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Rendering snapshot {:?}", event);
            match self.sink.publish(event.clone()).await {
                Ok(_) => {
                    info!("Rendered snapshot {:?}", event)
                }
                Err(e) => {
                    error!("Error rendering snapshot {:?}: {e:?}", event)
                }
            }
        }

        let result = self.sink.finalize().await;
        self.receiver.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use crate::{daemon::poll::StatusEvent, tracker::entities::OpenSession};

    use super::{status_line, FileStatusSink, MockStatusSink, RenderModule, StatusSink};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn active_event(elapsed: Duration) -> StatusEvent {
        let start = Utc.from_utc_datetime(&TEST_START_DATE);
        StatusEvent {
            current: Some(OpenSession {
                category: "programming".into(),
                start,
            }),
            at: start + elapsed,
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(
            status_line(&active_event(Duration::minutes(102))),
            "programming (01:42)"
        );
        assert_eq!(
            status_line(&StatusEvent {
                current: None,
                at: Utc.from_utc_datetime(&TEST_START_DATE),
            }),
            "no active session"
        );
    }

    #[tokio::test]
    async fn test_file_sink_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("status.txt");
        let mut sink = FileStatusSink::new(path.clone());

        sink.publish(active_event(Duration::minutes(5))).await?;
        assert_eq!(tokio::fs::read_to_string(&path).await?, "programming (00:05)\n");

        sink.publish(active_event(Duration::minutes(65))).await?;
        assert_eq!(tokio::fs::read_to_string(&path).await?, "programming (01:05)\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_render_module_drains_and_finalizes() -> Result<()> {
        let mut sink = MockStatusSink::new();
        sink.expect_publish().times(2).returning(|_| Ok(()));
        sink.expect_finalize().times(1).returning(|| Ok(()));

        let (sender, receiver) = mpsc::channel(10);
        let module = RenderModule::new(receiver, sink);

        sender.send(active_event(Duration::minutes(1))).await?;
        sender.send(active_event(Duration::minutes(2))).await?;
        drop(sender);

        module.run().await?;
        Ok(())
    }
}
