use super::SubjectKind;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// The requested subject does not exist. Aborts the dashboard and is never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    pub kind: SubjectKind,
    pub subject_id: Uuid,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} not found", self.kind.as_str(), self.subject_id)
    }
}

impl std::error::Error for NotFoundError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineExceededError {
    pub kind: SubjectKind,
    pub subject_id: Uuid,
    pub deadline: Duration,
}

impl fmt::Display for DeadlineExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dashboard for {} exceeded deadline of {}ms",
            self.kind.as_str(),
            self.subject_id,
            self.deadline.as_millis()
        )
    }
}

impl std::error::Error for DeadlineExceededError {}

pub fn not_found(kind: SubjectKind, subject_id: Uuid) -> anyhow::Error {
    anyhow::Error::new(NotFoundError { kind, subject_id })
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<NotFoundError>().is_some()
}

pub fn is_deadline_exceeded(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DeadlineExceededError>().is_some()
}
