use crate::domain::models::AuditOutcome;

/// Sink for committed outcomes on the `audit.pass` / `audit.fail` channels.
///
/// Publishing happens after the store commit and must not fail the commit,
/// so the method is infallible.
pub trait OutcomePublisher: Send + Sync {
    fn publish(&self, outcome: AuditOutcome);
}
