//! The result a [`crate::runner::MessageHandler`] hands back to the runner
//! (§4.7 "Failure semantics summary").

/// Whether the runner should commit the bus offset for a processed message.
///
/// §5: "Offset commit is the sole durability boundary for consumer
/// progress. A commit occurs if and only if the handler returned without a
/// transport error." [`Self::Commit`] covers every other case named in
/// §4.7: terminal no-ops, idempotent no-op retries, malformed messages, and
/// C4 no-match — all of these still commit so the partition isn't stalled
/// on data that will never succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Processing finished (successfully, idempotently, or the message was
    /// unprocessable) — advance the offset.
    Commit,
    /// A transport error occurred against C1/C2/C3/C4 or the bus itself —
    /// leave the offset uncommitted so the broker redelivers.
    LeaveUncommitted,
}
