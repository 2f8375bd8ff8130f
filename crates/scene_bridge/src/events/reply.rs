//! Futures answered through the callback channel

use super::callbacks::{Handler, HandlerError};
use crate::engine::EngineError;
use futures::channel::oneshot;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;

/// Why a reply never produced a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// The bridge was torn down before the engine answered
    #[error("Bridge was torn down before the reply arrived")]
    TornDown,

    /// The engine answered with an unexpected payload
    #[error("Could not decode reply: {0}")]
    Decode(String),

    /// The query never reached the engine
    #[error("Query was not submitted: {0}")]
    Engine(#[from] EngineError),
}

/// Value the engine will deliver later
///
/// Resolves once the engine answers the associated callback id.
#[derive(Debug)]
#[must_use = "a reply does nothing unless awaited"]
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T, ReplyError>>,
}

impl<T> Reply<T> {
    /// Reply that is already failed
    pub(crate) fn failed(error: ReplyError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { rx }
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T, ReplyError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(ReplyError::TornDown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Handler that completes a [`Reply`] with the decoded payload
///
/// Only the first delivery counts. Dropping the handler unanswered resolves
/// the reply with [`ReplyError::TornDown`].
pub(crate) fn reply_handler<T>() -> (Handler, Reply<T>)
where
    T: DeserializeOwned + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let slot = Mutex::new(Some(tx));
    let handler: Handler = Arc::new(move |payload: &Value| {
        let Some(tx) = slot.lock().take() else {
            return Ok(());
        };
        let decoded = serde_json::from_value::<T>(payload.clone()).map_err(|e| ReplyError::Decode(e.to_string()));
        let failure = decoded.as_ref().err().map(|e| HandlerError::new(e.to_string()));
        let _ = tx.send(decoded);
        failure.map_or(Ok(()), Err)
    });
    (handler, Reply { rx })
}
