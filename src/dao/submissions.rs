use std::borrow::Cow;

use sqlx::PgConnection;
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{DUPLICATE_SUBMISSION_MESSAGE, QuerySubmissionDbResp, SubmissionAddInputType, SubmissionDetailType, SubmissionKeyInputType, SubmissionUpdateInputType, SubmissionsListOutputType},
};

/**
 * SQL query to retrieve all submissions, newest first.
 */
const QUERY_SUBMISSIONS_LIST: &str = "SELECT id, division, submission_month, submission_year, warehouse_hours, created_at, updated_at
                                      FROM warehouse_submissions
                                      ORDER BY created_at DESC, id DESC";

/**
 * SQL query to retrieve a submission by division, month and year.
 */
const QUERY_SUBMISSION_BY_KEY: &str = "SELECT id, division, submission_month, submission_year, warehouse_hours, created_at, updated_at
                                       FROM warehouse_submissions
                                       WHERE division = $1 AND submission_month = $2 AND submission_year = $3";

/**
 * SQL query to retrieve the id of a submission by division, month and year.
 */
const QUERY_SUBMISSION_ID_BY_KEY: &str = "SELECT id FROM warehouse_submissions WHERE division = $1 AND submission_month = $2 AND submission_year = $3";

/**
 * SQL query to add a new submission.
 */
const ADD_SUBMISSION: &str = "INSERT INTO warehouse_submissions (division, submission_month, submission_year, warehouse_hours, created_at, updated_at)
                              VALUES ($1, $2, $3, $4, now(), now()) RETURNING id";

/**
 * SQL query to update the hours of a submission.
 */
const UPDATE_SUBMISSION_HOURS: &str = "UPDATE warehouse_submissions SET warehouse_hours = $1, updated_at = now() WHERE id = $2";

/**
 * SQL query to delete a submission.
 */
const DELETE_SUBMISSION: &str = "DELETE FROM warehouse_submissions WHERE id = $1";

/**
 * Postgres error code for unique violations.
 */
const UNIQUE_VIOLATION: &str = "23505";

/**
 * DAO for the warehouse_submissions table.
 */
pub struct SubmissionsDao {}

impl SubmissionsDao {
    /**
     * Creates a new instance of `SubmissionsDao`.
     *
     * # Returns
     * A new instance of `SubmissionsDao`.
     */
    pub fn new() -> Self {
        SubmissionsDao {}
    }

    /**
     * Retrieves all submissions ordered by creation time, newest first.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * A Result containing `SubmissionsListOutputType` or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_submissions_list(&self, connection: &mut PgConnection) -> Result<SubmissionsListOutputType, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QuerySubmissionDbResp> = sqlx::query_as(QUERY_SUBMISSIONS_LIST)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_query_error(&err, "Failed to fetch submissions"))?;
        Ok(SubmissionsListOutputType::new(results.into_iter().map(SubmissionDetailType::from).collect()))
    }

    /**
     * Retrieves a submission by division, month and year.
     *
     * # Arguments
     * `connection`: The database connection.
     * `key`: The division, month and year to look up.
     *
     * # Returns
     * A Result containing the submission if found, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_submission_by_key(&self, connection: &mut PgConnection, key: &SubmissionKeyInputType) -> Result<Option<SubmissionDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<QuerySubmissionDbResp> = sqlx::query_as(QUERY_SUBMISSION_BY_KEY)
            .bind(&key.division)
            .bind(key.submission_month)
            .bind(key.submission_year)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_query_error(&err, "Failed to fetch submission"))?;
        Ok(result.map(SubmissionDetailType::from))
    }

    /**
     * Retrieves the id of a submission by division, month and year.
     *
     * # Arguments
     * `connection`: The database connection.
     * `key`: The division, month and year to look up.
     *
     * # Returns
     * A Result containing the id if a submission exists, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_submission_id_by_key(&self, connection: &mut PgConnection, key: &SubmissionKeyInputType) -> Result<Option<i64>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<(i64,)> = sqlx::query_as(QUERY_SUBMISSION_ID_BY_KEY)
            .bind(&key.division)
            .bind(key.submission_month)
            .bind(key.submission_year)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_query_error(&err, "Failed to check submission"))?;
        Ok(result.map(|row| row.0))
    }

    /**
     * Adds a new submission.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `submission_add_input`: The submission to add.
     *
     * # Returns
     * The id of the new submission. A unique violation is returned as `ErrorType::Conflict` with an unknown id (0),
     * the caller resolves the id of the existing submission.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn add_submission(&self, transaction: &mut PgConnection, submission_add_input: SubmissionAddInputType) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let new_id: (i64,) = sqlx::query_as(ADD_SUBMISSION)
            .bind(submission_add_input.key.division)
            .bind(submission_add_input.key.submission_month)
            .bind(submission_add_input.key.submission_year)
            .bind(submission_add_input.warehouse_hours)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(&err, "Failed to create submission"))?;
        Ok(new_id.0)
    }

    /**
     * Updates the hours of an existing submission and refreshes its update timestamp.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `submission_id`: The ID of the submission to update.
     * `submission_update_input`: The new hours.
     *
     * # Returns
     * A result indicating success or failure of the operation.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn update_submission_hours(&self, transaction: &mut PgConnection, submission_id: i64, submission_update_input: SubmissionUpdateInputType) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(UPDATE_SUBMISSION_HOURS)
            .bind(submission_update_input.warehouse_hours)
            .bind(submission_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_query_error(&err, "Failed to update submission"))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Submission with id {} not found for update", submission_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Submission not found".to_string()));
        }
        if result.rows_affected() > 1 {
            tracing::warn!("Multiple submissions attempted updated. Rolled back");
            return Err(ApplicationError::new(ErrorType::Application, "Failed to update submission".to_string()));
        }
        Ok(())
    }

    /**
     * Deletes a submission by its ID.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `submission_id`: The ID of the submission to delete.
     *
     * # Returns
     * A result indicating success or failure of the operation.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn delete_submission(&self, transaction: &mut PgConnection, submission_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_SUBMISSION)
            .bind(submission_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_query_error(&err, "Failed to delete submission"))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Submission with id {} not found for deletion", submission_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Submission not found".to_string()));
        }
        if result.rows_affected() > 1 {
            tracing::warn!("Multiple submissions attempted deleted. Rolled back");
            return Err(ApplicationError::new(ErrorType::Application, "Failed to delete submission".to_string()));
        }
        Ok(())
    }

    /**
     * Logs a failed read or update and maps it to a generic database error.
     *
     * # Arguments
     * `error`: The error returned by sqlx.
     * `message`: The message returned to the client.
     */
    fn handle_query_error(error: &sqlx::Error, message: &str) -> ApplicationError {
        tracing::error!("{message}: {error}");
        ApplicationError::new(ErrorType::DatabaseError, message.to_string())
    }

    /**
     * Handles insert errors and maps them to application errors.
     *
     * # Arguments
     * `error`: The error returned by sqlx.
     * `message`: The message returned to the client for unclassified errors.
     *
     * # Returns
     * An `ApplicationError` corresponding to the database error.
     */
    fn handle_database_error(error: &sqlx::Error, message: &str) -> ApplicationError {
        if let Some(db_error) = error.as_database_error() {
            tracing::debug!("Database error: {}", db_error);
            if db_error.code() == Some(Cow::Borrowed(UNIQUE_VIOLATION)) {
                tracing::info!("Unique violation on insert: {:?}", db_error.constraint());
                return ApplicationError::new(ErrorType::Conflict { submission_id: 0 }, DUPLICATE_SUBMISSION_MESSAGE.to_string());
            }
        }
        Self::handle_query_error(error, message)
    }
}


#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    use super::*;

    fn add_input(division: &str, month: i32, year: i32, hours: Decimal) -> SubmissionAddInputType {
        SubmissionAddInputType { key: SubmissionKeyInputType::new(division.to_string(), month, year), warehouse_hours: hours }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_add_then_get_by_key(pool: PgPool) {
        let dao = SubmissionsDao::new();
        let mut transaction = pool.begin().await.unwrap();
        let new_id = dao.add_submission(&mut transaction, add_input("100", 3, 2025, Decimal::new(425, 1))).await.unwrap();
        transaction.commit().await.unwrap();

        let mut connection = pool.acquire().await.unwrap();
        let key = SubmissionKeyInputType::new("100".to_string(), 3, 2025);
        let submission = dao.get_submission_by_key(&mut connection, &key).await.unwrap().unwrap();
        assert_eq!(submission.id, new_id);
        assert_eq!(submission.division, "100");
        assert_eq!(submission.submission_month, 3);
        assert_eq!(submission.submission_year, 2025);
        assert_eq!(submission.warehouse_hours, Decimal::new(425, 1));
        assert_eq!(submission.created_at, submission.updated_at);
        assert_eq!(dao.get_submission_id_by_key(&mut connection, &key).await.unwrap(), Some(new_id));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_get_by_key_not_found(pool: PgPool) {
        let dao = SubmissionsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let key = SubmissionKeyInputType::new("999".to_string(), 1, 2025);
        assert!(dao.get_submission_by_key(&mut connection, &key).await.unwrap().is_none());
        assert!(dao.get_submission_id_by_key(&mut connection, &key).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_unique_violation_is_conflict(pool: PgPool) {
        let dao = SubmissionsDao::new();
        let mut transaction = pool.begin().await.unwrap();
        dao.add_submission(&mut transaction, add_input("100", 3, 2025, Decimal::ONE)).await.unwrap();
        transaction.commit().await.unwrap();

        let mut transaction = pool.begin().await.unwrap();
        let err = dao.add_submission(&mut transaction, add_input("100", 3, 2025, Decimal::TWO)).await.unwrap_err();
        assert!(matches!(err.error_type, ErrorType::Conflict { .. }));
        assert_eq!(err.message, DUPLICATE_SUBMISSION_MESSAGE);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_list_newest_first(pool: PgPool) {
        let dao = SubmissionsDao::new();
        let mut ids = vec![];
        for month in 1..=3 {
            let mut transaction = pool.begin().await.unwrap();
            ids.push(dao.add_submission(&mut transaction, add_input("200", month, 2024, Decimal::from(month))).await.unwrap());
            transaction.commit().await.unwrap();
        }
        let mut connection = pool.acquire().await.unwrap();
        let output = dao.get_submissions_list(&mut connection).await.unwrap();
        let listed: Vec<i64> = output.submissions.iter().map(|submission| submission.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_then_delete(pool: PgPool) {
        let dao = SubmissionsDao::new();
        let mut transaction = pool.begin().await.unwrap();
        let new_id = dao.add_submission(&mut transaction, add_input("300", 5, 2025, Decimal::ONE)).await.unwrap();
        transaction.commit().await.unwrap();

        let mut connection = pool.acquire().await.unwrap();
        let key = SubmissionKeyInputType::new("300".to_string(), 5, 2025);
        let before = dao.get_submission_by_key(&mut connection, &key).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let mut transaction = pool.begin().await.unwrap();
        dao.update_submission_hours(&mut transaction, new_id, SubmissionUpdateInputType { warehouse_hours: Decimal::new(50, 0) }).await.unwrap();
        transaction.commit().await.unwrap();

        let submission = dao.get_submission_by_key(&mut connection, &key).await.unwrap().unwrap();
        assert_eq!(submission.warehouse_hours, Decimal::new(50, 0));
        assert_eq!(submission.created_at, before.created_at);
        assert!(submission.updated_at > before.updated_at);

        let mut transaction = pool.begin().await.unwrap();
        dao.delete_submission(&mut transaction, new_id).await.unwrap();
        transaction.commit().await.unwrap();
        assert!(dao.get_submission_by_key(&mut connection, &key).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_and_delete_unknown_id(pool: PgPool) {
        let dao = SubmissionsDao::new();
        let mut transaction = pool.begin().await.unwrap();
        let err = dao.update_submission_hours(&mut transaction, 4242, SubmissionUpdateInputType { warehouse_hours: Decimal::ONE }).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
        let err = dao.delete_submission(&mut transaction, 4242).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
        transaction.rollback().await.unwrap();
    }
}
