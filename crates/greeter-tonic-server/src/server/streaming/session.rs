//! Bidirectional greeting sessions.
//!
//! A [`BiStreamSession`] is the state of one `SayHelloBiStream` call. It
//! answers every inbound request with exactly one reply, in order, and tracks
//! the call's lifecycle:
//!
//! ```text
//! Idle --on_next--> Active --on_completed--> Completed
//!   |                 |
//!   +-----------------+--on_error / abort--> Errored
//! ```
//!
//! Once `Completed` or `Errored`, the session releases its sink and rejects
//! further events with [`Error::InvalidState`]. Only `Completed` ends the
//! outbound stream cleanly; `Errored` always ends it with an error status. All event methods take
//! `&mut self`, so a session can never process two events at once.
//!
//! [`drive_session`] pumps an inbound request stream into a session.

use super::outbound::Outbound;
use futures::{Stream, StreamExt};
use greeter_tonic_core::{
    Error, Result,
    proto::HelloRequest,
    types::{greet, to_reply},
};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Lifecycle of a [`BiStreamSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Established, no request received yet.
    Idle,
    /// At least one request answered.
    Active,
    /// The peer finished sending and completion was signalled.
    Completed,
    /// The exchange failed; nothing more is emitted.
    Errored,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }
}

/// State of one bidirectional greeting exchange.
#[derive(Debug)]
pub struct BiStreamSession {
    id: u64,
    state: SessionState,
    sink: Option<Outbound>,
    shutdown: CancellationToken,
    replies: u64,
    cause: Option<String>,
}

impl BiStreamSession {
    /// Creates an idle session answering on `sink`. Sends waiting on a slow
    /// peer give up once `shutdown` is cancelled.
    pub fn new(id: u64, sink: Outbound, shutdown: CancellationToken) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            sink: Some(sink),
            shutdown,
            replies: 0,
            cause: None,
        }
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Number of replies emitted so far.
    pub const fn replies(&self) -> u64 {
        self.replies
    }

    /// The failure recorded by [`on_error`](Self::on_error) or
    /// [`abort`](Self::abort), if any.
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Answers one inbound request.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the session already completed or failed.
    ///   Nothing is emitted.
    /// - [`Error::InvalidArgument`] if the request carries no name. The
    ///   session stays open; the caller decides whether to abort it.
    /// - [`Error::SinkFailure`] if the peer stopped receiving, or
    ///   [`Error::ServiceShutdown`] if the service shut down while the reply
    ///   waited for room. The session stays open so the caller can
    ///   [`abort`](Self::abort) it with that error.
    pub async fn on_next(&mut self, request: HelloRequest) -> Result<()> {
        let sink = self.live_sink("on_next")?;
        let name = request.name.ok_or_else(Error::missing_name)?;

        tracing::info!(session = self.id, "sayHelloBiStream onNext: {name}");
        sink.send(to_reply(greet(&name)), &self.shutdown).await?;

        self.state = SessionState::Active;
        self.replies += 1;
        Ok(())
    }

    /// Records an inbound failure and ends the session. The peer receives a
    /// generic `ABORTED` status instead of the completion signal; the cause
    /// itself stays on the session. Ignored if the session is already
    /// terminal.
    pub fn on_error(&mut self, cause: &Status) {
        if self.state.is_terminal() {
            tracing::debug!(
                session = self.id,
                "Ignoring onError after session {}: {cause}",
                self.state.as_str()
            );
            return;
        }

        tracing::error!(session = self.id, "sayHelloBiStream onError: {cause}");
        self.fail(
            Status::aborted("inbound stream failed"),
            cause.to_string(),
        );
    }

    /// Ends the session successfully. Every reply accepted by
    /// [`on_next`](Self::on_next) is already queued on the sink, so releasing
    /// it ends the outbound stream right after them.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the session already completed or failed.
    pub fn on_completed(&mut self) -> Result<()> {
        self.live_sink("on_completed")?;

        tracing::info!(
            session = self.id,
            replies = self.replies,
            "sayHelloBiStream onCompleted"
        );
        self.state = SessionState::Completed;
        if let Some(sink) = self.sink.take() {
            sink.complete();
        }
        Ok(())
    }

    /// Ends the session by sending `error` to the peer as its terminal event.
    /// Ignored if the session is already terminal.
    pub fn abort(&mut self, error: Error) {
        if self.state.is_terminal() {
            return;
        }

        tracing::warn!(session = self.id, "sayHelloBiStream aborted: {error}");
        let status = error.clone().into();
        self.fail(status, error.to_string());
    }

    fn live_sink(&self, event: &'static str) -> Result<&Outbound> {
        match (&self.sink, self.state.is_terminal()) {
            (Some(sink), false) => Ok(sink),
            _ => Err(Error::InvalidState {
                event,
                state: self.state.as_str(),
            }),
        }
    }

    fn fail(&mut self, status: Status, cause: String) {
        self.state = SessionState::Errored;
        if let Some(sink) = self.sink.take() {
            sink.fail(status);
        }
        self.cause = Some(cause);
    }
}

/// Feeds `inbound` into `session` until the stream ends, fails, or the
/// session's shutdown token is cancelled.
///
/// - End of stream completes the session.
/// - An inbound transport error is recorded with
///   [`BiStreamSession::on_error`] and is not propagated.
/// - A malformed request aborts the session with `INVALID_ARGUMENT`.
/// - A peer that went away aborts the session.
/// - Cancellation aborts the session with `UNAVAILABLE`, including while a
///   reply waits on a peer that stopped reading.
///
/// Returns the session in its terminal state alongside the outcome.
pub async fn drive_session<S>(
    inbound: S,
    mut session: BiStreamSession,
) -> (BiStreamSession, Result<()>)
where
    S: Stream<Item = core::result::Result<HelloRequest, Status>> + Send,
{
    let mut inbound = core::pin::pin!(inbound);
    let shutdown = session.shutdown.clone();

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                session.abort(Error::ServiceShutdown);
                return (session, Err(Error::ServiceShutdown));
            }
            next = inbound.next() => next,
        };

        match next {
            Some(Ok(request)) => {
                if let Err(e) = session.on_next(request).await {
                    session.abort(e.clone());
                    return (session, Err(e));
                }
            }
            Some(Err(status)) => {
                session.on_error(&status);
                return (session, Ok(()));
            }
            None => {
                let res = session.on_completed();
                return (session, res);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use greeter_tonic_core::proto::HelloReply;
    use tokio::{sync::mpsc, time::timeout};
    use tokio_stream::wrappers::ReceiverStream;

    fn request(name: &str) -> HelloRequest {
        HelloRequest {
            name: Some(name.to_string()),
        }
    }

    type Replies = mpsc::Receiver<core::result::Result<HelloReply, Status>>;

    /// Opens a session with room for `replies` queued replies.
    async fn open_with(replies: usize, shutdown: CancellationToken) -> (BiStreamSession, Replies) {
        let (tx, rx) = mpsc::channel(replies + 1);
        let outbound = Outbound::open(tx).await.unwrap();
        (BiStreamSession::new(7, outbound, shutdown), rx)
    }

    async fn open(replies: usize) -> (BiStreamSession, Replies) {
        open_with(replies, CancellationToken::new()).await
    }

    async fn drain(mut rx: Replies) -> Vec<core::result::Result<String, Status>> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item.map(|reply| reply.message));
        }
        out
    }

    #[tokio::test]
    async fn echoes_in_order_then_completes() {
        let (mut session, rx) = open(8).await;
        assert_eq!(session.state(), SessionState::Idle);

        session.on_next(request("a")).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        session.on_next(request("b")).await.unwrap();
        session.on_completed().unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.replies(), 2);
        // The receiver ends right after the two replies: completion is
        // signalled exactly once and nothing follows.
        let out: Vec<_> = drain(rx).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, ["Hello a", "Hello b"]);
    }

    #[tokio::test]
    async fn rejects_next_after_completion() {
        let (mut session, mut rx) = open(8).await;
        session.on_completed().unwrap();

        let err = session.on_next(request("late")).await.unwrap_err();
        assert_eq!(
            err,
            Error::InvalidState {
                event: "on_next",
                state: "completed"
            }
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn error_ends_stream_with_aborted_not_completion() {
        let (mut session, rx) = open(8).await;
        session.on_next(request("a")).await.unwrap();
        session.on_error(&Status::cancelled("client reset"));

        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.cause().unwrap().contains("client reset"));

        let err = session.on_next(request("b")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { state: "errored", .. }));
        assert!(session.on_completed().is_err());

        let out = drain(rx).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "Hello a");
        let status = out[1].as_ref().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Aborted);
        assert!(!status.message().contains("client reset"));
    }

    #[tokio::test]
    async fn second_error_is_ignored() {
        let (mut session, rx) = open(1).await;
        session.on_error(&Status::unknown("first"));
        session.on_error(&Status::unknown("second"));

        let cause = session.cause().unwrap();
        assert!(cause.contains("first") && !cause.contains("second"));
        assert_eq!(drain(rx).await.len(), 1);
    }

    #[tokio::test]
    async fn completion_is_signalled_once() {
        let (mut session, _rx) = open(1).await;
        session.on_completed().unwrap();
        assert!(matches!(
            session.on_completed(),
            Err(Error::InvalidState {
                event: "on_completed",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn missing_name_keeps_session_open() {
        let (mut session, _rx) = open(1).await;
        let err = session.on_next(HelloRequest { name: None }).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn closed_sink_is_reported_without_counting_a_reply() {
        let (mut session, rx) = open(1).await;
        drop(rx);

        let err = session.on_next(request("a")).await.unwrap_err();
        assert!(matches!(err, Error::SinkFailure { .. }));
        assert_eq!(session.replies(), 0);

        session.abort(err);
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn driver_completes_on_end_of_stream() {
        let (session, rx) = open(8).await;
        let inbound = tokio_stream::iter(["x", "y", "z"].map(|n| Ok(request(n))));

        let (session, res) = drive_session(inbound, session).await;
        res.unwrap();
        assert_eq!(session.state(), SessionState::Completed);

        let out: Vec<_> = drain(rx).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, ["Hello x", "Hello y", "Hello z"]);
    }

    #[tokio::test]
    async fn driver_records_inbound_error_and_signals_failure() {
        let (session, rx) = open(8).await;
        let inbound = tokio_stream::iter(vec![
            Ok(request("x")),
            Err(Status::unknown("transport broke")),
            Ok(request("never")),
        ]);

        let (session, res) = drive_session(inbound, session).await;
        res.unwrap();
        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.cause().unwrap().contains("transport broke"));

        let out = drain(rx).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "Hello x");
        assert_eq!(out[1].as_ref().unwrap_err().code(), tonic::Code::Aborted);
    }

    #[tokio::test]
    async fn driver_aborts_on_missing_name() {
        let (session, rx) = open(8).await;
        let inbound = tokio_stream::iter(vec![
            Ok(request("x")),
            Ok(HelloRequest { name: None }),
        ]);

        let (session, res) = drive_session(inbound, session).await;
        assert!(matches!(res, Err(Error::InvalidArgument { .. })));
        assert_eq!(session.state(), SessionState::Errored);

        let out = drain(rx).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "Hello x");
        assert_eq!(out[1].as_ref().unwrap_err().code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn driver_aborts_on_shutdown() {
        let token = CancellationToken::new();
        let (session, rx) = open_with(8, token.clone()).await;
        let (_inbound_tx, inbound_rx) = mpsc::channel(1);
        token.cancel();

        let (session, res) = drive_session(ReceiverStream::new(inbound_rx), session).await;
        assert_eq!(res, Err(Error::ServiceShutdown));
        assert_eq!(session.state(), SessionState::Errored);

        let out = drain(rx).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap_err().code(), tonic::Code::Unavailable);
    }

    #[tokio::test]
    async fn driver_shutdown_unblocks_a_peer_that_stopped_reading() {
        let token = CancellationToken::new();
        let (session, mut rx) = open_with(1, token.clone()).await;
        let inbound = tokio_stream::iter(vec![Ok(request("a")), Ok(request("b"))]);
        let driver = tokio::spawn(drive_session(inbound, session));

        // "a" fills the buffer and "b" waits for room.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!driver.is_finished());
        token.cancel();

        let (session, res) = timeout(Duration::from_secs(2), driver)
            .await
            .expect("driver stayed blocked after shutdown")
            .unwrap();
        assert_eq!(res, Err(Error::ServiceShutdown));
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(session.replies(), 1);

        assert_eq!(rx.recv().await.unwrap().unwrap().message, "Hello a");
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert!(rx.recv().await.is_none());
    }
}
