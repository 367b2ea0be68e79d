//! Preview stream status handling.
//!
//! The stream's status channel outlives the open handshake: the pipeline
//! waits on it for `Opened`, then hands it to a [`PreviewMonitor`] that keeps
//! publishing the latest status and raises a restart signal when the stream
//! faults later on.

use super::types::SessionSignal;
use crate::callback::DeviceResult;
use crate::device::PreviewStatusChannel;
use crate::errors::DeviceError;
use crate::types::PreviewStatus;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Suspend until the stream opens or fails.
pub(crate) async fn await_open(channel: &mut PreviewStatusChannel) -> DeviceResult<()> {
    while let Some(status) = channel.recv().await {
        match status {
            PreviewStatus::Opened => return Ok(()),
            PreviewStatus::Error => {
                return Err(DeviceError::Failed(
                    "preview stream reported error while opening".to_string(),
                ))
            }
            PreviewStatus::Opening | PreviewStatus::Idle => {
                log::debug!("preview stream status: {:?}", status);
            }
        }
    }
    Err(DeviceError::ConnectionLost)
}

pub(crate) struct PreviewMonitor {
    status: watch::Receiver<PreviewStatus>,
    task: JoinHandle<()>,
}

impl PreviewMonitor {
    /// Take over an already-opened stream's status channel.
    pub(crate) fn spawn(
        mut channel: PreviewStatusChannel,
        signals: broadcast::Sender<SessionSignal>,
        session_id: Uuid,
    ) -> Self {
        let (tx, rx) = watch::channel(PreviewStatus::Opened);
        let task = tokio::spawn(async move {
            while let Some(status) = channel.recv().await {
                tx.send_replace(status);
                match status {
                    PreviewStatus::Error => {
                        log::warn!("[{}] preview stream faulted after opening", session_id);
                        let _ = signals.send(SessionSignal::RestartRequired);
                    }
                    PreviewStatus::Idle => {
                        log::info!("[{}] preview stream went idle", session_id);
                    }
                    PreviewStatus::Opening | PreviewStatus::Opened => {
                        log::debug!("[{}] preview stream status: {:?}", session_id, status);
                    }
                }
            }
            tx.send_replace(PreviewStatus::Idle);
            log::debug!("[{}] preview status channel closed", session_id);
        });

        Self { status: rx, task }
    }

    pub(crate) fn status(&self) -> PreviewStatus {
        *self.status.borrow()
    }
}

impl Drop for PreviewMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_await_open_skips_opening() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PreviewStatus::Opening).unwrap();
        tx.send(PreviewStatus::Opened).unwrap();
        assert!(await_open(&mut rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_await_open_fails_on_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PreviewStatus::Error).unwrap();
        assert!(matches!(await_open(&mut rx).await, Err(DeviceError::Failed(_))));
    }

    #[tokio::test]
    async fn test_closed_channel_is_connection_loss() {
        let (tx, mut rx) = mpsc::unbounded_channel::<PreviewStatus>();
        drop(tx);
        assert_eq!(await_open(&mut rx).await, Err(DeviceError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_monitor_signals_late_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (signals, mut signal_rx) = broadcast::channel(4);
        let monitor = PreviewMonitor::spawn(rx, signals, Uuid::new_v4());
        assert_eq!(monitor.status(), PreviewStatus::Opened);

        tx.send(PreviewStatus::Error).unwrap();
        assert_eq!(signal_rx.recv().await.unwrap(), SessionSignal::RestartRequired);
        assert_eq!(monitor.status(), PreviewStatus::Error);
    }
}
