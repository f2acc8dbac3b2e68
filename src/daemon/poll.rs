use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    tracker::{entities::OpenSession, store::SessionStore},
    utils::clock::Clock,
};

/// Snapshot of the current-session register at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub current: Option<OpenSession>,
    pub at: DateTime<Utc>,
}

/// Periodically re-reads the register and forwards snapshots for rendering.
/// Reading from disk on every tick is what lets one-shot cli invocations and
/// the resident daemon coexist without any shared state.
pub struct StatusPollModule<S> {
    next: mpsc::Sender<StatusEvent>,
    store: S,
    shutdown: CancellationToken,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
}

impl<S: SessionStore> StatusPollModule<S> {
    pub fn new(
        next: mpsc::Sender<StatusEvent>,
        store: S,
        shutdown: CancellationToken,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            store,
            shutdown,
            poll_interval,
            clock,
        }
    }

    async fn collect(&self) -> Result<StatusEvent> {
        let current = self.store.load_current().await?;
        Ok(StatusEvent {
            current,
            at: self.clock.time(),
        })
    }

    /// Executes the poller event loop.
    pub async fn run(self) -> Result<()> {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;

            match self.collect().await {
                Ok(event) => {
                    let span = info_span!("Forwarding status snapshot");
                    debug!("Sending snapshot {:?}", event);
                    self.next
                        .send(event)
                        .instrument(span)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                    info!("Successfully sent snapshot")
                }
                Err(e) => {
                    error!("Encountered an error during polling {:?}", e)
                }
            }

            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which
                // means we also drop the sender channel and consequently stop
                // the render module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }
}
