use super::executor::{StreamCursor, StreamingExecutor};
use super::{BatchWriteRequest, BatchWriteResponse};
use crate::core::{DbError, Result};
use crate::interface::{CallOptions, SessionProvider};
use futures::Stream;
use std::sync::Arc;
use tracing::debug;

/// Everything needed to start the call on first pull.
struct PendingCall {
    provider: Arc<dyn SessionProvider>,
    request: BatchWriteRequest,
    options: CallOptions,
}

impl PendingCall {
    async fn start(self) -> Result<StreamCursor> {
        let cancel = self.options.cancellation.clone();

        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DbError::Cancelled),
            acquired = self.provider.acquire_session(None, &cancel) => acquired?,
        };
        debug!(session = session.name(), "acquired session for batch write");

        StreamingExecutor::open(session, self.request, self.options).await
    }
}

enum State {
    Pending(PendingCall),
    Streaming(StreamCursor),
    Finished,
}

/// Lazily produced sequence of per-group outcomes.
///
/// Nothing touches the network until the first [`try_next`](Self::try_next).
/// Outcomes come back in the order the server reports them. After the
/// sequence ends or fails it stays finished and yields `Ok(None)`.
pub struct BatchOutcomes {
    state: State,
    yielded: usize,
}

impl BatchOutcomes {
    /// A sequence that completes without yielding anything
    pub(crate) fn empty() -> Self {
        Self {
            state: State::Finished,
            yielded: 0,
        }
    }

    pub(crate) fn pending(
        provider: Arc<dyn SessionProvider>,
        request: BatchWriteRequest,
        options: CallOptions,
    ) -> Self {
        Self {
            state: State::Pending(PendingCall {
                provider,
                request,
                options,
            }),
            yielded: 0,
        }
    }

    /// Pull the next outcome.
    ///
    /// The first pull acquires a session and opens the stream; failures of
    /// either surface here.
    pub async fn try_next(&mut self) -> Result<Option<BatchWriteResponse>> {
        if matches!(self.state, State::Pending(_)) {
            if let State::Pending(call) = std::mem::replace(&mut self.state, State::Finished) {
                self.state = State::Streaming(call.start().await?);
            }
        }

        let State::Streaming(cursor) = &mut self.state else {
            return Ok(None);
        };

        match cursor.try_next().await {
            Ok(Some(outcome)) => {
                self.yielded += 1;
                Ok(Some(outcome))
            }
            finished => {
                self.state = State::Finished;
                finished
            }
        }
    }

    /// Drain every remaining outcome.
    pub async fn collect_all(mut self) -> Result<Vec<BatchWriteResponse>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.try_next().await? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Stop early, releasing the stream and session if they are held.
    pub fn close(&mut self) {
        self.state = State::Finished;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Outcomes handed out so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Adapt into a `futures::Stream`. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<BatchWriteResponse>> + Send {
        futures::stream::try_unfold(self, |mut outcomes| async move {
            let next = outcomes.try_next().await?;
            Ok::<_, DbError>(next.map(|outcome| (outcome, outcomes)))
        })
    }
}

impl std::fmt::Debug for BatchOutcomes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Pending(_) => "pending",
            State::Streaming(_) => "streaming",
            State::Finished => "finished",
        };
        f.debug_struct("BatchOutcomes")
            .field("state", &state)
            .field("yielded", &self.yielded)
            .finish()
    }
}
