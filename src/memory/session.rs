use super::{MemoryStore, ResponseOrder};
use crate::batch::{BatchWriteRequest, BatchWriteResponse, MutationGroup};
use crate::core::Result;
use crate::interface::{BatchWriteStream, CallOptions, Session};
use async_trait::async_trait;
use std::collections::VecDeque;
use uuid::Uuid;

/// Session on a [`MemoryStore`]
pub struct MemorySession {
    name: String,
    store: MemoryStore,
}

impl MemorySession {
    pub(crate) fn new(database: &str, store: MemoryStore) -> Self {
        Self {
            name: format!("{}/sessions/{}", database, Uuid::new_v4()),
            store,
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_batch_write(
        &mut self,
        request: BatchWriteRequest,
        _options: CallOptions,
    ) -> Result<Box<dyn BatchWriteStream>> {
        Ok(Box::new(MemoryBatchStream::new(self.store.clone(), request)))
    }
}

/// Response stream that applies one group per pull.
///
/// Groups not yet pulled when the stream is released are never applied.
pub struct MemoryBatchStream {
    store: MemoryStore,
    pending: VecDeque<(usize, MutationGroup)>,
    released: bool,
}

impl MemoryBatchStream {
    fn new(store: MemoryStore, request: BatchWriteRequest) -> Self {
        let mut pending: VecDeque<(usize, MutationGroup)> =
            request.mutation_groups.into_iter().enumerate().collect();
        if store.response_order() == ResponseOrder::Reversed {
            pending.make_contiguous().reverse();
        }

        store.stream_opened();
        Self {
            store,
            pending,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.pending.clear();
            self.store.stream_released();
        }
    }
}

#[async_trait]
impl BatchWriteStream for MemoryBatchStream {
    async fn next_message(&mut self) -> Result<Option<BatchWriteResponse>> {
        let Some((index, group)) = self.pending.pop_front() else {
            return Ok(None);
        };
        Ok(Some(self.store.apply_group(index, &group).await))
    }

    fn dispose(&mut self) {
        self.release();
    }
}

impl Drop for MemoryBatchStream {
    fn drop(&mut self) {
        self.release();
    }
}
