use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    error::{JsonPayloadError, PathError},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{SubmissionAddInputType, SubmissionDetailType, SubmissionExistsOutputType, SubmissionKeyInputType, SubmissionUpdateInputType, SubmissionsListOutputType},
    },
    service::export::format_timestamp,
};

/***************** Submissions:add models *********************/

/**
 * Request body for adding a submission. Fields are optional so missing values can be reported as a validation error.
 */
#[derive(Debug, Deserialize)]
pub struct SubmissionAddRequest {
    pub division: Option<String>,
    pub submission_month: Option<i32>,
    pub submission_year: Option<i32>,
    pub warehouse_hours: Option<Decimal>,
}

/**
 * Converts the request into input. Division must be non-empty, month and year non-zero, and hours present (zero is allowed).
 */
impl TryFrom<SubmissionAddRequest> for SubmissionAddInputType {
    type Error = ApplicationError;

    fn try_from(request: SubmissionAddRequest) -> Result<Self, Self::Error> {
        match request {
            SubmissionAddRequest { division: Some(division), submission_month: Some(submission_month), submission_year: Some(submission_year), warehouse_hours: Some(warehouse_hours) }
                if !division.is_empty() && submission_month != 0 && submission_year != 0 =>
            {
                Ok(SubmissionAddInputType { key: SubmissionKeyInputType::new(division, submission_month, submission_year), warehouse_hours })
            }
            _ => Err(ApplicationError::new(ErrorType::Validation, "All fields are required".to_string())),
        }
    }
}

/**
 * Response for a created submission.
 */
#[derive(Debug, Serialize)]
pub struct SubmissionCreatedResponse {
    pub message: String,
    pub id: i64,
}

impl SubmissionCreatedResponse {
    pub fn new(id: i64) -> Self {
        SubmissionCreatedResponse { message: "Submission created successfully".to_string(), id }
    }
}

/***************** Submissions:update models *********************/

/**
 * Request body for updating the hours of a submission.
 */
#[derive(Debug, Deserialize)]
pub struct SubmissionUpdateRequest {
    pub warehouse_hours: Option<Decimal>,
}

impl TryFrom<SubmissionUpdateRequest> for SubmissionUpdateInputType {
    type Error = ApplicationError;

    fn try_from(request: SubmissionUpdateRequest) -> Result<Self, Self::Error> {
        let Some(warehouse_hours) = request.warehouse_hours else {
            return Err(ApplicationError::new(ErrorType::Validation, "Warehouse hours is required".to_string()));
        };
        Ok(SubmissionUpdateInputType { warehouse_hours })
    }
}

/***************** Submissions:get models *********************/

/**
 * A submission as returned by list, lookup and JSON export.
 */
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    id: i64,
    division: String,
    submission_month: i32,
    submission_year: i32,
    /**
     * Serialized as a JSON number.
     */
    #[serde(with = "rust_decimal::serde::float")]
    warehouse_hours: Decimal,
    /**
     * ISO-8601 with milliseconds, same as the CSV export.
     */
    #[serde(serialize_with = "serialize_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    updated_at: DateTime<Utc>,
}

impl From<SubmissionDetailType> for SubmissionResponse {
    fn from(submission: SubmissionDetailType) -> Self {
        SubmissionResponse {
            id: submission.id,
            division: submission.division,
            submission_month: submission.submission_month,
            submission_year: submission.submission_year,
            warehouse_hours: submission.warehouse_hours.normalize(),
            created_at: submission.created_at,
            updated_at: submission.updated_at,
        }
    }
}

/**
 * Converts a list output into the JSON array returned by the list endpoint.
 */
pub fn to_submission_responses(submissions: Vec<SubmissionDetailType>) -> Vec<SubmissionResponse> {
    submissions.into_iter().map(SubmissionResponse::from).collect()
}

impl From<SubmissionsListOutputType> for Vec<SubmissionResponse> {
    fn from(output: SubmissionsListOutputType) -> Self {
        to_submission_responses(output.submissions)
    }
}

fn serialize_timestamp<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(timestamp))
}

/**
 * Response of the existence check.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCheckResponse {
    exists: bool,
    submission_id: Option<i64>,
}

impl From<SubmissionExistsOutputType> for SubmissionCheckResponse {
    fn from(output: SubmissionExistsOutputType) -> Self {
        SubmissionCheckResponse { exists: output.exists(), submission_id: output.submission_id }
    }
}

/***************** Common models *********************/

/**
 * Plain message response, used for successful updates and deletes and for lookups that found nothing.
 */
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        MessageResponse { message: message.to_string() }
    }
}

/**
 * Liveness probe response.
 */
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        HealthResponse { status: "ok".to_string(), message: "Server is running".to_string() }
    }
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /**
     * A human-readable message describing the error.
     */
    pub error: String,
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * Id of the existing submission on conflicts.
     */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<i64>,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let submission_id = match self.error_type {
            ErrorType::Conflict { submission_id } => Some(submission_id),
            _ => None,
        };
        let error_response = ErrorResponse { error: self.message.clone(), code: get_error_code(&self.error_type), submission_id };
        HttpResponse::build(self.status_code()).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::Validation => StatusCode::BAD_REQUEST,
        ErrorType::Conflict { .. } => StatusCode::CONFLICT,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Initialization | ErrorType::DatabaseError | ErrorType::Application => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::Initialization => 1001,
        ErrorType::Validation => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::NotFound => 1004,
        ErrorType::Conflict { .. } => 1005,
        ErrorType::Application => 1006,
    }
}

/**
 * Turns malformed JSON bodies into validation errors.
 */
pub fn json_error_handler(err: JsonPayloadError, _request: &HttpRequest) -> actix_web::Error {
    tracing::debug!("Invalid JSON payload: {err}");
    ApplicationError::new(ErrorType::Validation, format!("Invalid request body: {err}")).into()
}

/**
 * Turns path parameters that cannot be parsed (e.g. a non-numeric month) into validation errors.
 */
pub fn path_error_handler(err: PathError, _request: &HttpRequest) -> actix_web::Error {
    tracing::debug!("Invalid path parameters: {err}");
    ApplicationError::new(ErrorType::Validation, format!("Invalid path parameters: {err}")).into()
}
