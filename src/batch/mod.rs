// ============================================================================
// Batch Writes
// ============================================================================
//
// Non-transactional multi-group writes. A command collects mutation groups,
// sends them in one streaming request and hands back the per-group outcomes
// as the server reports them.
//
// ============================================================================

pub mod command;
pub mod executor;
pub mod group;
pub mod outcomes;
pub mod request;
pub mod response;

pub use command::BatchMutationCommand;
pub use executor::{StreamCursor, StreamingExecutor};
pub use group::MutationGroup;
pub use outcomes::BatchOutcomes;
pub use request::{BatchRequestBuilder, BatchWriteOptions, BatchWriteRequest, Priority};
pub use response::BatchWriteResponse;
