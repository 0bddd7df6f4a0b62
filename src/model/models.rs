use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Message returned when a submission already exists for a division, month and year.
 */
pub const DUPLICATE_SUBMISSION_MESSAGE: &str = "Submission already exists for this division, month, and year";

/**
 * Database response type for a full submission row.
 *
 * Column order: id, division, submission_month, submission_year, warehouse_hours, created_at, updated_at.
 */
pub type QuerySubmissionDbResp = (i64, String, i32, i32, Decimal, DateTime<Utc>, DateTime<Utc>);

/**
 * A stored warehouse hours submission.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDetailType {
    pub id: i64,
    pub division: String,
    pub submission_month: i32,
    pub submission_year: i32,
    pub warehouse_hours: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuerySubmissionDbResp> for SubmissionDetailType {
    fn from(row: QuerySubmissionDbResp) -> Self {
        let (id, division, submission_month, submission_year, warehouse_hours, created_at, updated_at) = row;
        SubmissionDetailType { id, division, submission_month, submission_year, warehouse_hours, created_at, updated_at }
    }
}

/**
 * List of submissions, newest first.
 */
#[derive(Debug)]
pub struct SubmissionsListOutputType {
    pub submissions: Vec<SubmissionDetailType>,
}

impl SubmissionsListOutputType {
    pub fn new(submissions: Vec<SubmissionDetailType>) -> Self {
        SubmissionsListOutputType { submissions }
    }
}

/**
 * Identifies a submission by its natural key.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionKeyInputType {
    pub division: String,
    pub submission_month: i32,
    pub submission_year: i32,
}

impl SubmissionKeyInputType {
    pub fn new(division: String, submission_month: i32, submission_year: i32) -> Self {
        SubmissionKeyInputType { division, submission_month, submission_year }
    }
}

/**
 * Result of an existence check for a division, month and year.
 */
#[derive(Debug, PartialEq)]
pub struct SubmissionExistsOutputType {
    pub submission_id: Option<i64>,
}

impl SubmissionExistsOutputType {
    pub fn new(submission_id: Option<i64>) -> Self {
        SubmissionExistsOutputType { submission_id }
    }

    pub fn exists(&self) -> bool {
        self.submission_id.is_some()
    }
}

/**
 * Input for adding a new submission. All required fields have been checked for presence.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionAddInputType {
    pub key: SubmissionKeyInputType,
    pub warehouse_hours: Decimal,
}

impl SubmissionAddInputType {
    /**
     * Validates the ranges of the input.
     *
     * Division codes and years are accepted as given, the client restricts them.
     *
     * # Returns
     * The validated input or a validation error.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if !(1..=12).contains(&self.key.submission_month) {
            return Err(ApplicationError::new(ErrorType::Validation, "Submission month must be between 1 and 12".to_string()));
        }
        validate_hours(self.warehouse_hours)?;
        Ok(self)
    }
}

/**
 * Input for updating the hours of an existing submission.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionUpdateInputType {
    pub warehouse_hours: Decimal,
}

impl SubmissionUpdateInputType {
    /**
     * Validates the ranges of the input.
     *
     * # Returns
     * The validated input or a validation error.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        validate_hours(self.warehouse_hours)?;
        Ok(self)
    }
}

/**
 * Hours are stored as NUMERIC(10,2). Values the column would round or reject are refused up front.
 */
fn validate_hours(warehouse_hours: Decimal) -> Result<(), ApplicationError> {
    if warehouse_hours.is_sign_negative() && !warehouse_hours.is_zero() {
        return Err(ApplicationError::new(ErrorType::Validation, "Warehouse hours cannot be negative".to_string()));
    }
    if warehouse_hours.normalize().scale() > MAX_HOURS_SCALE {
        return Err(ApplicationError::new(ErrorType::Validation, format!("Warehouse hours cannot have more than {MAX_HOURS_SCALE} decimal places")));
    }
    if warehouse_hours >= Decimal::from(MAX_HOURS_EXCLUSIVE) {
        return Err(ApplicationError::new(ErrorType::Validation, format!("Warehouse hours must be less than {MAX_HOURS_EXCLUSIVE}")));
    }
    Ok(())
}

const MAX_HOURS_SCALE: u32 = 2;
const MAX_HOURS_EXCLUSIVE: i64 = 100_000_000;

#[cfg(test)]
mod test {
    use super::*;

    fn add_input(month: i32, hours: Decimal) -> SubmissionAddInputType {
        SubmissionAddInputType { key: SubmissionKeyInputType::new("100".to_string(), month, 2025), warehouse_hours: hours }
    }

    #[test]
    fn test_add_validate_ok() {
        let input = add_input(3, Decimal::new(425, 1));
        assert_eq!(input.clone().validate().unwrap(), input);
    }

    #[test]
    fn test_add_validate_zero_hours() {
        assert!(add_input(12, Decimal::ZERO).validate().is_ok());
    }

    #[test]
    fn test_add_validate_month_out_of_range() {
        let err = add_input(13, Decimal::ONE).validate().unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
        let err = add_input(-1, Decimal::ONE).validate().unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
    }

    #[test]
    fn test_add_validate_negative_hours() {
        let err = add_input(1, Decimal::new(-1, 2)).validate().unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
    }

    #[test]
    fn test_add_validate_hours_precision() {
        assert!(add_input(1, Decimal::new(42555, 3)).validate().is_err());
        assert!(add_input(1, Decimal::new(42550, 3)).validate().is_ok());
        assert!(add_input(1, Decimal::new(4255, 2)).validate().is_ok());
    }

    #[test]
    fn test_add_validate_hours_magnitude() {
        let err = add_input(1, Decimal::from(100_000_000)).validate().unwrap_err();
        assert_eq!(err.error_type, ErrorType::Validation);
        assert!(add_input(1, Decimal::new(9_999_999_999, 2)).validate().is_ok());
    }

    #[test]
    fn test_update_validate() {
        assert!(SubmissionUpdateInputType { warehouse_hours: Decimal::new(50, 0) }.validate().is_ok());
        assert!(SubmissionUpdateInputType { warehouse_hours: Decimal::NEGATIVE_ONE }.validate().is_err());
        assert!(SubmissionUpdateInputType { warehouse_hours: Decimal::new(1001, 3) }.validate().is_err());
    }

    #[test]
    fn test_detail_from_row() {
        let now = Utc::now();
        let detail = SubmissionDetailType::from((7, "200".to_string(), 4, 2024, Decimal::new(1000, 2), now, now));
        assert_eq!(detail.id, 7);
        assert_eq!(detail.division, "200");
        assert_eq!(detail.submission_month, 4);
        assert_eq!(detail.submission_year, 2024);
        assert_eq!(detail.warehouse_hours, Decimal::new(10, 0));
    }

    #[test]
    fn test_exists_output() {
        assert!(SubmissionExistsOutputType::new(Some(1)).exists());
        assert!(!SubmissionExistsOutputType::new(None).exists());
    }
}
