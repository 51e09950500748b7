use crate::catalog::CatalogRecord;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has no id")]
    MissingId,

    #[error("{0}: missing title")]
    MissingTitle(String),

    #[error("{0}: missing artist")]
    MissingArtist(String),

    #[error("{id}: negative duration {seconds}")]
    NegativeDuration { id: String, seconds: i64 },
}

/// A zero duration means "unknown" and is accepted.
pub fn validate(record: &CatalogRecord) -> Result<(), ValidationError> {
    if record.id.trim().is_empty() {
        return Err(ValidationError::MissingId);
    }
    if record.title.trim().is_empty() {
        return Err(ValidationError::MissingTitle(record.id.clone()));
    }
    if record.artist.trim().is_empty() {
        return Err(ValidationError::MissingArtist(record.id.clone()));
    }
    if record.duration_seconds < 0 {
        return Err(ValidationError::NegativeDuration {
            id: record.id.clone(),
            seconds: record.duration_seconds,
        });
    }
    Ok(())
}

/// Keeps valid records; returns them with the number dropped.
pub fn retain_valid(records: Vec<CatalogRecord>) -> (Vec<CatalogRecord>, usize) {
    let before = records.len();
    let valid: Vec<_> = records
        .into_iter()
        .filter(|record| match validate(record) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping invalid record: {}", e);
                false
            }
        })
        .collect();
    let dropped = before - valid.len();
    (valid, dropped)
}
