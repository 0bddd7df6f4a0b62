use actix_web::{
    HttpRequest, HttpResponse, delete, get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    post, put,
    web::{self, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        rest::{HealthResponse, MessageResponse, SubmissionAddRequest, SubmissionCheckResponse, SubmissionCreatedResponse, SubmissionResponse, SubmissionUpdateRequest, to_submission_responses},
        state::AppState,
    },
    model::{
        apperror::ApplicationError,
        models::{SubmissionAddInputType, SubmissionKeyInputType, SubmissionUpdateInputType},
    },
    service::export::submissions_to_csv,
};

/**
 * Endpoint to retrieve all submissions, newest first.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "listSubmissions", trace_id = get_trace_id(&http_request), result))]
#[get("/api/submissions")]
pub async fn list_submissions(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let output = app_state.submissions_service.get_submissions_list().instrument(span).await?;
    Ok(HttpResponse::Ok().json(Vec::<SubmissionResponse>::from(output)))
}

/**
 * Endpoint to export all submissions as a CSV attachment.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "exportCsv", trace_id = get_trace_id(&http_request), result))]
#[get("/api/export/csv")]
pub async fn export_csv(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let submissions = app_state.submissions_service.export_submissions().instrument(span).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(export_disposition("csv"))
        .body(submissions_to_csv(&submissions)))
}

/**
 * Endpoint to export all submissions as a JSON attachment.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "exportJson", trace_id = get_trace_id(&http_request), result))]
#[get("/api/export/json")]
pub async fn export_json(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let submissions = app_state.submissions_service.export_submissions().instrument(span).await?;
    Ok(HttpResponse::Ok().insert_header(export_disposition("json")).json(to_submission_responses(submissions)))
}

/**
 * Endpoint to retrieve a submission by division, month and year.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "getSubmission", trace_id = get_trace_id(&http_request), result))]
#[get("/api/submissions/{division}/{month}/{year}")]
pub async fn get_submission(path: Path<(String, i32, i32)>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let (division, month, year) = path.into_inner();
    let submission = app_state.submissions_service.get_submission(SubmissionKeyInputType::new(division, month, year)).instrument(span).await?;
    match submission {
        Some(submission) => Ok(HttpResponse::Ok().json(SubmissionResponse::from(submission))),
        None => Ok(HttpResponse::NotFound().json(MessageResponse::new("Submission not found"))),
    }
}

/**
 * Endpoint to check whether a division has already submitted for a month and year.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "checkSubmission", trace_id = get_trace_id(&http_request), result))]
#[get("/api/check-submission/{division}/{month}/{year}")]
pub async fn check_submission(path: Path<(String, i32, i32)>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let (division, month, year) = path.into_inner();
    let output = app_state.submissions_service.check_submission(SubmissionKeyInputType::new(division, month, year)).instrument(span).await?;
    Ok(HttpResponse::Ok().json(SubmissionCheckResponse::from(output)))
}

/**
 * Add a new submission.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "addSubmission", trace_id = get_trace_id(&http_request), result))]
#[post("/api/submissions")]
pub async fn add_submission(http_request: HttpRequest, request_body: web::Json<SubmissionAddRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let submission_add_input = SubmissionAddInputType::try_from(request_body.into_inner())?.validate()?;
    let new_id = app_state.submissions_service.add_submission(submission_add_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(SubmissionCreatedResponse::new(new_id)))
}

/**
 * Update the hours of a submission.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "updateSubmission", trace_id = get_trace_id(&http_request), result))]
#[put("/api/submissions/{submissionId}")]
pub async fn update_submission(path: Path<i64>, http_request: HttpRequest, request_body: web::Json<SubmissionUpdateRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let submission_id = path.into_inner();
    let submission_update_input = SubmissionUpdateInputType::try_from(request_body.into_inner())?.validate()?;
    app_state.submissions_service.update_submission(submission_id, submission_update_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Submission updated successfully")))
}

/**
 * Delete a submission.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "deleteSubmission", trace_id = get_trace_id(&http_request), result))]
#[delete("/api/submissions/{submissionId}")]
pub async fn delete_submission(path: Path<i64>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let submission_id = path.into_inner();
    app_state.submissions_service.delete_submission(submission_id).instrument(span).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Submission deleted successfully")))
}

/**
 * Liveness probe.
 */
#[get("/api/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::ok())
}

/**
 * Builds the attachment header for exports, e.g. `warehouse_hours_export_1740823200000.csv`.
 */
fn export_disposition(extension: &str) -> ContentDisposition {
    let filename = format!("warehouse_hours_export_{}.{extension}", chrono::Utc::now().timestamp_millis());
    ContentDisposition { disposition: DispositionType::Attachment, parameters: vec![DispositionParam::Filename(filename)] }
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID").and_then(|v| v.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
