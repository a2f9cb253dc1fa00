use super::{BatchWriteRequest, BatchWriteResponse};
use crate::core::{DbError, Result};
use crate::interface::{BatchWriteStream, CallOptions, Session};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Opens the server-streaming batch write call on an acquired session.
pub struct StreamingExecutor;

impl StreamingExecutor {
    /// Open the stream and hand back a cursor that owns both the session and
    /// the stream handle.
    pub async fn open(
        mut session: Box<dyn Session>,
        request: BatchWriteRequest,
        options: CallOptions,
    ) -> Result<StreamCursor> {
        let cancel = options.cancellation.clone();
        let deadline = options.timeout.map(|timeout| Instant::now() + timeout);

        debug!(
            session = session.name(),
            groups = request.group_count(),
            mutations = request.mutation_count(),
            "opening batch write stream"
        );

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DbError::Cancelled),
            opened = session.open_batch_write(request, options) => opened?,
        };

        Ok(StreamCursor {
            stream: Some(stream),
            session: Some(session),
            cancel,
            deadline,
            received: 0,
        })
    }
}

/// Pull cursor over an open response stream.
///
/// The stream handle is released exactly once: when the server finishes,
/// when a pull fails or is cancelled, on `close()`, or when the cursor is
/// dropped mid-stream. The session is released right after the stream.
pub struct StreamCursor {
    stream: Option<Box<dyn BatchWriteStream>>,
    session: Option<Box<dyn Session>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    received: usize,
}

impl StreamCursor {
    /// Advance by one message.
    ///
    /// Returns `Ok(None)` once the stream is exhausted or already released.
    pub async fn try_next(&mut self) -> Result<Option<BatchWriteResponse>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let pulled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DbError::Cancelled),
            pulled = pull(&mut **stream, self.deadline) => pulled,
        };

        match pulled {
            Ok(Some(message)) => {
                self.received += 1;
                Ok(Some(message))
            }
            Ok(None) => {
                debug!(received = self.received, "batch write stream completed");
                self.release();
                Ok(None)
            }
            Err(err) => {
                warn!(received = self.received, error = %err, "batch write stream failed");
                self.release();
                Err(err)
            }
        }
    }

    /// Release the stream and session without draining remaining messages.
    pub fn close(&mut self) {
        self.release();
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Messages received so far
    pub fn received(&self) -> usize {
        self.received
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.dispose();
        }
        self.session = None;
    }
}

impl Drop for StreamCursor {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(received = self.received, "batch write stream abandoned");
        }
        self.release();
    }
}

async fn pull(
    stream: &mut dyn BatchWriteStream,
    deadline: Option<Instant>,
) -> Result<Option<BatchWriteResponse>> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, stream.next_message())
            .await
            .map_err(|_| DbError::Timeout("batch write deadline exceeded".into()))?,
        None => stream.next_message().await,
    }
}
