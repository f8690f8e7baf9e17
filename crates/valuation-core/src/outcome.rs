/// Result of a call into an external collaborator (listing provider, notifier,
/// risk advisor). Failures are values, not errors: every caller matches both
/// arms and substitutes its own default.
#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorOutcome<T> {
    Ok(T),
    Failed(String),
}

impl<T> CollaboratorOutcome<T> {
    pub fn failed(reason: impl Into<String>) -> Self {
        CollaboratorOutcome::Failed(reason.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CollaboratorOutcome::Ok(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CollaboratorOutcome<U> {
        match self {
            CollaboratorOutcome::Ok(v) => CollaboratorOutcome::Ok(f(v)),
            CollaboratorOutcome::Failed(reason) => CollaboratorOutcome::Failed(reason),
        }
    }

    /// Collapse into a value, logging the failure reason under `context`.
    pub fn unwrap_or_log(self, context: &str, default: T) -> T {
        match self {
            CollaboratorOutcome::Ok(v) => v,
            CollaboratorOutcome::Failed(reason) => {
                tracing::warn!("{}: {}", context, reason);
                default
            }
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for CollaboratorOutcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => CollaboratorOutcome::Ok(v),
            Err(e) => CollaboratorOutcome::Failed(e.to_string()),
        }
    }
}
