use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use poll::{StatusEvent, StatusPollModule};
use render::{FileStatusSink, RenderModule};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    tracker::store::{JsonStore, SessionStore},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod poll;
pub mod render;
pub mod shutdown;

/// The original updated its status display every 30 seconds. A sub-minute
/// refresh keeps the minutes-only elapsed display honest.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const STATUS_FILE_NAME: &str = "status.txt";

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<StatusEvent>(10);
    let store = JsonStore::new(dir.clone())?;

    let shutdown_token = CancellationToken::new();

    let poller = create_poller(
        sender,
        store,
        &shutdown_token,
        DefaultClock,
        DEFAULT_POLL_INTERVAL,
    );

    let renderer = create_renderer(receiver, dir.join(STATUS_FILE_NAME));

    let (_, poll_result, render_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        poller.run(),
        renderer.run(),
    );

    if let Err(poll_result) = poll_result {
        error!("Poll module got an error {:?}", poll_result);
    }

    if let Err(render_result) = render_result {
        error!("Render module got an error {:?}", render_result);
    }

    Ok(())
}

fn create_poller<S: SessionStore>(
    sender: mpsc::Sender<StatusEvent>,
    store: S,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
    poll_interval: Duration,
) -> StatusPollModule<S> {
    StatusPollModule::new(
        sender,
        store,
        shutdown_token.clone(),
        poll_interval,
        Box::new(clock),
    )
}

fn create_renderer(
    receiver: mpsc::Receiver<StatusEvent>,
    status_path: PathBuf,
) -> RenderModule<FileStatusSink> {
    RenderModule::new(receiver, FileStatusSink::new(status_path))
}
