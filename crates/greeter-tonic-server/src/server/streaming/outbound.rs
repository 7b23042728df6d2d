use greeter_tonic_core::{Error, Result, proto::HelloReply};
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Channel feeding the response stream of a streaming call.
pub type ReplySender = mpsc::Sender<core::result::Result<HelloReply, Status>>;

/// Outbound half of a streaming call.
///
/// One slot of the channel is held back for the terminal status, so a failed
/// call can always report its failure, even when the peer stopped reading and
/// every other slot is full. A stream that ends without that status is a
/// successful completion; dropping an `Outbound` is therefore only correct
/// through [`complete`](Self::complete) or [`fail`](Self::fail).
#[derive(Debug)]
pub struct Outbound {
    replies: ReplySender,
    terminal: OwnedPermit<core::result::Result<HelloReply, Status>>,
}

impl Outbound {
    /// Reserves the terminal slot on `replies`. The channel needs a capacity
    /// of at least two for any reply to fit next to it.
    ///
    /// # Errors
    ///
    /// [`Error::SinkFailure`] if the receiving side is already gone.
    pub async fn open(replies: ReplySender) -> Result<Self> {
        let terminal = replies
            .clone()
            .reserve_owned()
            .await
            .map_err(|_| Error::SinkFailure {
                context: "outbound stream closed before it opened".to_string(),
            })?;
        Ok(Self { replies, terminal })
    }

    /// Queues `reply`, waiting for room if the peer is slow.
    ///
    /// # Errors
    ///
    /// - [`Error::SinkFailure`] if the peer is gone.
    /// - [`Error::ServiceShutdown`] if `shutdown` is cancelled while waiting
    ///   for room.
    pub async fn send(&self, reply: HelloReply, shutdown: &CancellationToken) -> Result<()> {
        tokio::select! {
            // A free slot wins over cancellation.
            biased;
            res = self.replies.send(Ok(reply)) => res.map_err(|e| Error::SinkFailure {
                context: format!("outbound stream closed: {e}"),
            }),
            () = shutdown.cancelled() => Err(Error::ServiceShutdown),
        }
    }

    /// Ends the stream successfully once the queued replies are delivered.
    pub fn complete(self) {
        drop(self);
    }

    /// Ends the stream with `status` after the queued replies.
    pub fn fail(self, status: Status) {
        // The returned sender is dropped along with `replies`.
        let _ = self.terminal.send(Err(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use greeter_tonic_core::types::to_reply;
    use tokio::time::timeout;

    #[tokio::test]
    async fn completion_ends_the_stream_cleanly() {
        let (tx, mut rx) = mpsc::channel(2);
        let outbound = Outbound::open(tx).await.unwrap();
        outbound
            .send(to_reply("a".to_string()), &CancellationToken::new())
            .await
            .unwrap();
        outbound.complete();

        assert_eq!(rx.recv().await.unwrap().unwrap().message, "a");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn failure_is_delivered_even_when_full() {
        let (tx, mut rx) = mpsc::channel(2);
        let outbound = Outbound::open(tx).await.unwrap();
        outbound
            .send(to_reply("a".to_string()), &CancellationToken::new())
            .await
            .unwrap();
        outbound.fail(Status::aborted("gone wrong"));

        assert!(rx.recv().await.unwrap().is_ok());
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Aborted);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn blocked_send_gives_way_to_shutdown() {
        let (tx, _rx) = mpsc::channel(2);
        let outbound = Outbound::open(tx).await.unwrap();
        let token = CancellationToken::new();
        outbound
            .send(to_reply("fills".to_string()), &token)
            .await
            .unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let res = timeout(
            Duration::from_secs(2),
            outbound.send(to_reply("blocked".to_string()), &token),
        )
        .await
        .expect("send stayed blocked after shutdown");
        assert_eq!(res, Err(Error::ServiceShutdown));
    }

    #[tokio::test]
    async fn closed_receiver_is_a_sink_failure() {
        let (tx, rx) = mpsc::channel(2);
        let outbound = Outbound::open(tx).await.unwrap();
        drop(rx);

        let err = outbound
            .send(to_reply("a".to_string()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SinkFailure { .. }));
    }
}
