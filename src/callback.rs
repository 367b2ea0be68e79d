//! Bridge from callback-style vendor SDK calls to single-shot futures.
//!
//! Adapters create a [`completion`] pair per command, move the
//! [`Completion`] into the SDK callback and await the [`Pending`] half.
//! Each pair resolves exactly once and is never retried.

use crate::errors::DeviceError;
use tokio::sync::oneshot;

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Callback half: fired by the SDK when the command finishes.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<DeviceResult<T>>,
}

/// Awaiting half: held by the caller that issued the command.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<DeviceResult<T>>,
}

pub fn completion<T>() -> (Completion<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, Pending { rx })
}

impl<T> Completion<T> {
    /// Deliver the outcome. Returns `false` when the caller is gone, in which
    /// case the late result is discarded.
    pub fn complete(self, result: DeviceResult<T>) -> bool {
        let delivered = self.tx.send(result).is_ok();
        if !delivered {
            log::debug!("discarding device completion: caller was cancelled");
        }
        delivered
    }

    pub fn succeed(self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(self, error: DeviceError) -> bool {
        self.complete(Err(error))
    }

    pub fn connection_error(self) -> bool {
        self.complete(Err(DeviceError::ConnectionLost))
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Pending<T> {
    /// Suspend until the SDK fires the callback.
    ///
    /// A callback dropped without firing means the SDK tore down the link.
    pub async fn wait(self) -> DeviceResult<T> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("device callback dropped without completing");
                Err(DeviceError::ConnectionLost)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_delivers_once() {
        let (done, pending) = completion::<u32>();
        tokio::spawn(async move {
            done.succeed(7);
        });
        assert_eq!(pending.wait().await, Ok(7));
    }

    #[tokio::test]
    async fn test_dropped_callback_is_connection_loss() {
        let (done, pending) = completion::<()>();
        drop(done);
        assert_eq!(pending.wait().await, Err(DeviceError::ConnectionLost));
    }

    #[test]
    fn test_pending_until_callback_fires() {
        let (done, pending) = completion::<u8>();
        let mut waiting = tokio_test::task::spawn(pending.wait());
        tokio_test::assert_pending!(waiting.poll());

        assert!(done.succeed(3));
        assert!(waiting.is_woken());
        assert_eq!(tokio_test::assert_ready!(waiting.poll()), Ok(3));
    }

    #[test]
    fn test_late_completion_is_discarded() {
        let (done, pending) = completion::<()>();
        drop(pending);
        assert!(done.is_cancelled());
        assert!(!done.succeed(()));
    }
}
