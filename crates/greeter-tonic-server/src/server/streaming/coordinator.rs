use super::outbound::Outbound;
use greeter_tonic_core::{Error, types::to_reply};
use tokio_util::sync::CancellationToken;

/// Emits the replies of one `SayHelloServerStream` call.
///
/// Sends `count` copies of `message` to `outbound` in order, then completes
/// it: the stream ends cleanly exactly once.
///
/// # Arguments
///
/// - `name`: The caller's name, used in logs.
/// - `message`: The preformatted greeting.
/// - `count`: Number of replies to emit.
/// - `outbound`: Response channel of the call.
/// - `shutdown`: Service-wide cancellation token.
///
/// # Behavior
///
/// - If the client disconnects, the remaining replies are abandoned and
///   [`Error::SinkFailure`] is returned instead of completing.
/// - If the service starts shutting down, including while waiting on a
///   client that stopped reading, the stream ends with an `UNAVAILABLE`
///   status and [`Error::ServiceShutdown`] is returned.
pub async fn feed_replies(
    name: &str,
    mut message: String,
    count: usize,
    outbound: Outbound,
    shutdown: CancellationToken,
) -> greeter_tonic_core::Result<()> {
    for k in 1..=count {
        let res = if shutdown.is_cancelled() {
            Err(Error::ServiceShutdown)
        } else {
            tracing::info!("sayHelloServerStream onNext: {name} {k} times");

            // The last reply takes ownership instead of copying the banner again.
            let reply = if k == count {
                to_reply(core::mem::take(&mut message))
            } else {
                to_reply(message.clone())
            };
            outbound.send(reply, &shutdown).await
        };

        if let Err(e) = res {
            tracing::debug!("sayHelloServerStream stopped at reply {k} of {count}: {e}");
            outbound.fail(e.clone().into());
            return Err(e);
        }
    }

    tracing::info!("sayHelloServerStream onCompleted");
    outbound.complete();
    Ok(())
}
