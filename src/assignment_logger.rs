use crate::events::AssignmentEvent;

/// A trait for logging assignment events to your analytics storage.
///
/// The client calls `log_assignment` at most once per unique assignment (see
/// [`crate::cache`] for the deduplication rules), so implementations don't
/// need to deduplicate themselves.
///
/// This method is called synchronously on the evaluation path, so it is
/// important that `log_assignment` does not block the calling thread.
/// Implementations should not panic; errors that occur during logging should
/// be handled internally.
pub trait AssignmentLogger {
    /// Logs the assignment event to the storage system.
    fn log_assignment(&self, event: AssignmentEvent);
}

pub(crate) struct NoopAssignmentLogger;
impl AssignmentLogger for NoopAssignmentLogger {
    fn log_assignment(&self, _event: AssignmentEvent) {}
}

impl<T: Fn(AssignmentEvent)> AssignmentLogger for T {
    fn log_assignment(&self, event: AssignmentEvent) {
        self(event);
    }
}
