use super::{BatchOutcomes, BatchRequestBuilder, BatchWriteOptions, MutationGroup, Priority};
use crate::core::{DbError, Result};
use crate::interface::{CallOptions, SessionProvider};
use crate::mutation::Mutation;
use crate::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A batch of mutation groups to write in one streaming call.
///
/// All mutations in a group are committed atomically. The groups themselves
/// are committed independently, in an order chosen by the store, and each one
/// reports its own outcome.
///
/// The command has a single owner while it is being built; `add` takes
/// `&mut self` and the command is not meant to be shared between tasks.
/// `execute` consumes it, so a command runs at most once.
///
/// # Examples
///
/// ```no_run
/// # use batchwrite::{CancellationToken, Connection, Mutation, Value, Write};
/// # async fn run(connection: Connection) -> batchwrite::Result<()> {
/// let mut command = connection.create_batch_mutation_command();
/// command.add([Mutation::insert(
///     Write::new("Singers", ["SingerId", "Name"]).row([Value::from(1i64), Value::from("Marc")]),
/// )]);
///
/// let mut outcomes = command.execute(CancellationToken::new())?;
/// while let Some(outcome) = outcomes.try_next().await? {
///     println!("groups {:?}: {}", outcome.indexes, outcome.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BatchMutationCommand {
    provider: Arc<dyn SessionProvider>,
    mutation_groups: Vec<MutationGroup>,
    transaction: Option<Transaction>,
    options: BatchWriteOptions,
    call_timeout: Option<Duration>,
}

impl BatchMutationCommand {
    const TYPE_NAME: &'static str = "BatchMutationCommand";

    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            provider,
            mutation_groups: Vec::new(),
            transaction: None,
            options: BatchWriteOptions::default(),
            call_timeout: None,
        }
    }

    /// Add one mutation group. The mutations are copied into the batch.
    pub fn add<I>(&mut self, mutations: I) -> &mut Self
    where
        I: IntoIterator<Item = Mutation>,
    {
        self.mutation_groups.push(mutations.into_iter().collect());
        self
    }

    /// Add one mutation group from a slice.
    pub fn add_mutations(&mut self, mutations: &[Mutation]) -> &mut Self {
        self.mutation_groups.push(MutationGroup::from(mutations));
        self
    }

    /// Add a group that may be absent. An absent group is rejected and the
    /// batch is left unchanged.
    pub fn try_add<I>(&mut self, mutations: Option<I>) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Mutation>,
    {
        let mutations = mutations
            .ok_or_else(|| DbError::InvalidArgument("mutations must not be null".into()))?;
        Ok(self.add(mutations))
    }

    pub fn mutation_groups(&self) -> &[MutationGroup] {
        &self.mutation_groups
    }

    pub fn len(&self) -> usize {
        self.mutation_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutation_groups.is_empty()
    }

    /// Transaction attached to this command. Must be `None` at execution
    /// time: batch writes do not participate in transactions.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn set_transaction(&mut self, transaction: Option<Transaction>) {
        self.transaction = transaction;
    }

    pub fn options(&self) -> &BatchWriteOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: BatchWriteOptions) {
        self.options = options;
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.options.priority = priority;
    }

    pub fn set_request_tag(&mut self, tag: impl Into<String>) {
        self.options.request_tag = Some(tag.into());
    }

    pub fn set_exclude_txn_from_change_streams(&mut self, exclude: bool) {
        self.options.exclude_txn_from_change_streams = exclude;
    }

    /// Deadline for the stream, measured from stream open
    pub fn set_call_timeout(&mut self, timeout: Option<Duration>) {
        self.call_timeout = timeout;
    }

    /// Execute the batch.
    ///
    /// Fails immediately, before any I/O, if a transaction is attached. With
    /// no groups the returned sequence is empty and no session is acquired.
    /// Otherwise the session is acquired and the stream opened on the first
    /// pull of the returned sequence; `cancel` is observed by both steps and
    /// by every later pull.
    pub fn execute(self, cancel: CancellationToken) -> Result<BatchOutcomes> {
        if self.transaction.is_some() {
            return Err(DbError::InvalidOperation(format!(
                "A transaction may not be used with {}.",
                Self::TYPE_NAME
            )));
        }

        if self.mutation_groups.is_empty() {
            debug!("batch write has no mutation groups");
            return Ok(BatchOutcomes::empty());
        }

        let request = BatchRequestBuilder::new()
            .options(self.options)
            .groups(self.mutation_groups)
            .build();
        debug!(
            groups = request.group_count(),
            mutations = request.mutation_count(),
            "prepared batch write request"
        );

        let options = CallOptions::new(cancel).with_timeout(self.call_timeout);
        Ok(BatchOutcomes::pending(self.provider, request, options))
    }
}

impl std::fmt::Debug for BatchMutationCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(Self::TYPE_NAME)
            .field("mutation_groups", &self.mutation_groups.len())
            .field("transaction", &self.transaction.as_ref().map(Transaction::id))
            .field("options", &self.options)
            .finish()
    }
}
