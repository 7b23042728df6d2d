//! gRPC service implementation for the greeter.
//!
//! This module defines [`GreeterService`], the concrete implementation of the
//! [`Greeter`] gRPC service defined in the protobuf specification. It exposes
//! one endpoint per interaction mode.
//!
//! ## Responsibilities
//!
//! - Validate incoming requests (`name` must be present).
//! - Format replies with the shared [`Banner`] or the short greeting.
//! - Dispatch asynchronous greetings to the background worker pool.
//! - Spawn one task per streaming call: [`feed_replies`] for server streams,
//!   [`drive_session`] for bidirectional streams.
//! - Handle backpressure, cancellation, and graceful shutdown.

use super::tracker::StreamTracker;
use crate::server::{
    config::ServerConfig,
    pool::{manager::WorkerPool, request::GreetingHandle},
    streaming::{
        coordinator::feed_replies,
        outbound::Outbound,
        session::{BiStreamSession, SessionState, drive_session},
    },
    telemetry::{increment_replies_sent, increment_requests, increment_stream_errors},
};
use core::pin::Pin;
use futures::TryStreamExt;
use greeter_tonic_core::{
    Error,
    proto::{HelloReply, HelloRequest, greeter_server::Greeter},
    types::{Banner, greet, to_reply},
};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

/// Outbound stream type shared by both streaming endpoints.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<HelloReply, Status>> + Send>>;

/// The greeter gRPC service.
///
/// Cloning is cheap: clones share the banner, the worker pool and the
/// shutdown state.
#[derive(Clone)]
pub struct GreeterService {
    config: ServerConfig,
    banner: Banner,
    worker_pool: Arc<WorkerPool>,
    tracker: Arc<StreamTracker>,
    shutdown_token: CancellationToken,
    next_session: Arc<AtomicU64>,
}

impl GreeterService {
    /// Creates a new `GreeterService` and spawns its worker pool.
    ///
    /// `banner` is built once by the caller at startup and shared by every
    /// call this service handles.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig, banner: Banner) -> Self {
        let shutdown_token = CancellationToken::new();
        let worker_pool = WorkerPool::spawn(config.num_workers, shutdown_token.clone());

        Self {
            config,
            banner,
            worker_pool: Arc::new(worker_pool),
            tracker: Arc::new(StreamTracker::default()),
            shutdown_token,
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Submits the short greeting for `name` to the worker pool.
    ///
    /// The returned handle resolves exactly once. Each call is computed
    /// independently; nothing is cached.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceShutdown`] or [`Error::ChannelError`] if the task could
    /// not be handed to a worker.
    pub async fn greet_async(&self, name: String) -> greeter_tonic_core::Result<GreetingHandle> {
        self.worker_pool.submit(move || Ok(greet(&name))).await
    }

    /// Number of streaming calls currently in flight.
    pub fn streams_inflight(&self) -> usize {
        self.tracker.inflight()
    }

    /// Initiates a graceful shutdown.
    ///
    /// New calls are refused immediately. In-flight streams get up to the
    /// configured shutdown timeout to finish; whatever is still running after
    /// that is cancelled, and finally each worker acknowledges termination.
    pub async fn shutdown(&self) {
        tracing::info!("Refusing new requests");
        self.tracker.refuse_new();

        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.tracker.inflight()
        );
        if self.tracker.drain(self.config.shutdown_timeout).await {
            tracing::debug!("All in-flight streams drained successfully");
        } else {
            tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.tracker.inflight()
            );
        }

        // Cancels the shared token, which also aborts remaining sessions.
        self.worker_pool.shutdown().await;
    }
}

fn required_name(request: HelloRequest) -> Result<String, Status> {
    request.name.ok_or_else(|| Error::missing_name().into())
}

#[tonic::async_trait]
impl Greeter for GreeterService {
    type SayHelloServerStreamStream = ReplyStream;
    type SayHelloBiStreamStream = ReplyStream;

    #[tracing::instrument(skip_all)]
    async fn say_hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        self.tracker.ensure_accepting()?;
        increment_requests("SayHello");

        let name = required_name(request.into_inner())?;
        tracing::info!("Received sayHello request: {name}");

        Ok(Response::new(to_reply(self.banner.greet(&name))))
    }

    /// Computes the greeting on the worker pool and awaits its single
    /// resolution.
    #[tracing::instrument(skip_all)]
    async fn say_hello_async(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        self.tracker.ensure_accepting()?;
        increment_requests("SayHelloAsync");

        let name = required_name(request.into_inner())?;
        tracing::info!("Received sayHelloAsync request: {name}");

        let message = self.greet_async(name).await?.await?;
        Ok(Response::new(to_reply(message)))
    }

    /// Streams `stream_replies` banner greetings, then completes.
    ///
    /// The request is validated before anything is emitted; a missing name
    /// fails the call itself rather than the stream.
    #[tracing::instrument(skip_all)]
    async fn say_hello_server_stream(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<Self::SayHelloServerStreamStream>, Status> {
        let name = required_name(request.into_inner())?;
        let guard = self.tracker.begin()?;
        increment_requests("SayHelloServerStream");
        tracing::info!("Received sayHelloServerStream request");

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size + 1);
        let outbound = Outbound::open(resp_tx).await?;
        let message = self.banner.greet(&name);
        let count = self.config.stream_replies;
        let shutdown = self.shutdown_token.clone();

        let fut = async move {
            let _guard = guard;
            if let Err(e) = feed_replies(&name, message, count, outbound, shutdown).await {
                increment_stream_errors();
                tracing::warn!("sayHelloServerStream ended early: {e}");
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("server_stream")));

        let stream = ReceiverStream::new(resp_rx).inspect_ok(|_| increment_replies_sent(1));
        Ok(Response::new(Box::pin(stream)))
    }

    /// Opens a bidirectional session answering each request in order.
    #[tracing::instrument(skip_all)]
    async fn say_hello_bi_stream(
        &self,
        request: Request<Streaming<HelloRequest>>,
    ) -> Result<Response<Self::SayHelloBiStreamStream>, Status> {
        let guard = self.tracker.begin()?;
        increment_requests("SayHelloBiStream");

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session = id, "Received sayHelloBiStream request");

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size + 1);
        let outbound = Outbound::open(resp_tx).await?;
        let session = BiStreamSession::new(id, outbound, self.shutdown_token.clone());
        let inbound = request.into_inner();

        let fut = async move {
            let _guard = guard;
            let (session, res) = drive_session(inbound, session).await;
            match res {
                Ok(()) if session.state() == SessionState::Completed => {}
                Ok(()) => increment_stream_errors(),
                Err(e) => {
                    increment_stream_errors();
                    tracing::warn!(session = session.id(), "sayHelloBiStream ended early: {e}");
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("bi_stream", session = id)));

        let stream = ReceiverStream::new(resp_rx).inspect_ok(|_| increment_replies_sent(1));
        Ok(Response::new(Box::pin(stream)))
    }
}
