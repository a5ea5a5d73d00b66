use crate::models::EntityId;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardError {
    #[error(
        "{plant_family} already planted on field {field_id} from {existing_start} to {existing_end} \
         (planting event {conflicting}); rotation window is {window_days} days"
    )]
    RotationConflict {
        field_id: EntityId,
        plant_family: String,
        conflicting: EntityId,
        existing_start: NaiveDate,
        existing_end: NaiveDate,
        window_days: i64,
    },

    #[error("Invalid attribute '{attribute}': {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("Guard lookup failed: {0}")]
    Lookup(String),
}

pub type GuardResult<T> = Result<T, GuardError>;

pub fn invalid_attribute(attribute: &str, reason: impl Into<String>) -> GuardError {
    GuardError::InvalidAttribute {
        attribute: attribute.to_string(),
        reason: reason.into(),
    }
}
