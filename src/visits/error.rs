use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisitStoreError {
    #[error("visit store lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("invalid pet id {0}: must be at least 1")]
    InvalidPetId(u32),
    #[error("description is {0} characters, limit is {limit}", limit = super::MAX_DESCRIPTION_LEN)]
    DescriptionTooLong(usize),
    #[error(transparent)]
    Store(#[from] VisitStoreError),
}

impl VisitError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            VisitError::InvalidPetId(_) | VisitError::DescriptionTooLong(_) => 400,
            VisitError::Store(_) => 500,
        }
    }
}
