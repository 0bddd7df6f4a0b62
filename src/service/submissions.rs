use sqlx::{Pool, Postgres, Transaction, pool::PoolConnection};

use crate::{
    dao::submissions::SubmissionsDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{
            DUPLICATE_SUBMISSION_MESSAGE, SubmissionAddInputType, SubmissionDetailType, SubmissionExistsOutputType, SubmissionKeyInputType, SubmissionUpdateInputType, SubmissionsListOutputType,
        },
    },
};

/**
 * Represents the service for managing warehouse hours submissions.
 */
pub struct SubmissionsService {
    /**
     * The DAO for submission operations.
     */
    submissions_dao: SubmissionsDao,
    /**
     * Connection pool for database operations. Optional so the HTTP layer can be tested without a database.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl SubmissionsService {
    /**
     * Creates a new instance of `SubmissionsService`.
     *
     * # Arguments
     * `submissions_dao`: The DAO for submission operations.
     * `connection_pool`: Optional connection pool for database operations.
     *
     * # Returns
     * A new instance of `SubmissionsService`.
     */
    pub fn new(submissions_dao: SubmissionsDao, connection_pool: Option<Pool<Postgres>>) -> Self {
        SubmissionsService { submissions_dao, connection_pool }
    }

    /**
     * Retrieves all submissions, newest first.
     */
    pub async fn get_submissions_list(&self) -> Result<SubmissionsListOutputType, ApplicationError> {
        let mut connection = self.acquire("Failed to fetch submissions").await?;
        self.submissions_dao.get_submissions_list(&mut connection).await
    }

    /**
     * Retrieves a submission by division, month and year.
     *
     * # Arguments
     * `key`: The division, month and year.
     *
     * # Returns
     * The submission, or `None` if nothing has been submitted for the key.
     */
    pub async fn get_submission(&self, key: SubmissionKeyInputType) -> Result<Option<SubmissionDetailType>, ApplicationError> {
        let mut connection = self.acquire("Failed to fetch submission").await?;
        self.submissions_dao.get_submission_by_key(&mut connection, &key).await
    }

    /**
     * Checks whether a submission exists for a division, month and year.
     *
     * # Arguments
     * `key`: The division, month and year.
     */
    pub async fn check_submission(&self, key: SubmissionKeyInputType) -> Result<SubmissionExistsOutputType, ApplicationError> {
        let mut connection = self.acquire("Failed to check submission").await?;
        let submission_id = self.submissions_dao.get_submission_id_by_key(&mut connection, &key).await?;
        Ok(SubmissionExistsOutputType::new(submission_id))
    }

    /**
     * Adds a new submission unless one already exists for the same division, month and year.
     *
     * # Arguments
     * `submission_add_input`: The validated submission.
     *
     * # Returns
     * The id of the new submission, or `ErrorType::Conflict` carrying the id of the existing one.
     */
    pub async fn add_submission(&self, submission_add_input: SubmissionAddInputType) -> Result<i64, ApplicationError> {
        let key = submission_add_input.key.clone();
        let mut transaction = self.begin("Failed to create submission").await?;
        match self.submissions_dao.get_submission_id_by_key(&mut transaction, &key).await {
            Ok(Some(existing_id)) => {
                Self::rollback(transaction).await?;
                tracing::info!("Submission already exists with id {}", existing_id);
                return Err(ApplicationError::new(ErrorType::Conflict { submission_id: existing_id }, DUPLICATE_SUBMISSION_MESSAGE.to_string()));
            }
            Ok(None) => {}
            Err(err) => {
                Self::rollback(transaction).await?;
                return Err(err);
            }
        }
        match self.submissions_dao.add_submission(&mut transaction, submission_add_input).await {
            Ok(new_id) => {
                Self::commit(transaction, "Failed to create submission").await?;
                Ok(new_id)
            }
            Err(ApplicationError { error_type: ErrorType::Conflict { .. }, .. }) => {
                // A concurrent insert won the race, report the id that is now stored.
                Self::rollback(transaction).await?;
                let existing = self.check_submission(key).await?;
                match existing.submission_id {
                    Some(existing_id) => Err(ApplicationError::new(ErrorType::Conflict { submission_id: existing_id }, DUPLICATE_SUBMISSION_MESSAGE.to_string())),
                    None => Err(ApplicationError::new(ErrorType::Application, "Failed to create submission".to_string())),
                }
            }
            Err(err) => {
                Self::rollback(transaction).await?;
                Err(err)
            }
        }
    }

    /**
     * Updates the hours of a submission.
     *
     * # Arguments
     * `submission_id`: The ID of the submission.
     * `submission_update_input`: The validated new hours.
     */
    pub async fn update_submission(&self, submission_id: i64, submission_update_input: SubmissionUpdateInputType) -> Result<(), ApplicationError> {
        let mut transaction = self.begin("Failed to update submission").await?;
        match self.submissions_dao.update_submission_hours(&mut transaction, submission_id, submission_update_input).await {
            Ok(()) => Self::commit(transaction, "Failed to update submission").await?,
            Err(err) => {
                Self::rollback(transaction).await?;
                return Err(err);
            }
        }
        Ok(())
    }

    /**
     * Deletes a submission by its ID.
     *
     * # Arguments
     * `submission_id`: The ID of the submission.
     */
    pub async fn delete_submission(&self, submission_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.begin("Failed to delete submission").await?;
        match self.submissions_dao.delete_submission(&mut transaction, submission_id).await {
            Ok(()) => Self::commit(transaction, "Failed to delete submission").await?,
            Err(err) => {
                Self::rollback(transaction).await?;
                return Err(err);
            }
        }
        Ok(())
    }

    /**
     * Retrieves all submissions for export, newest first.
     *
     * # Returns
     * The submissions, or `ErrorType::NotFound` when there is nothing to export.
     */
    pub async fn export_submissions(&self) -> Result<Vec<SubmissionDetailType>, ApplicationError> {
        let mut connection = self.acquire("Failed to export data").await?;
        let output = self.submissions_dao.get_submissions_list(&mut connection).await.map_err(|err| match err.error_type {
            ErrorType::DatabaseError => ApplicationError::new(ErrorType::DatabaseError, "Failed to export data".to_string()),
            _ => err,
        })?;
        if output.submissions.is_empty() {
            return Err(ApplicationError::new(ErrorType::NotFound, "No data to export".to_string()));
        }
        Ok(output.submissions)
    }

    /**
     * Closes the connection pool. Waits for checked out connections to be returned.
     */
    pub async fn close(&self) {
        if let Some(connection_pool) = &self.connection_pool {
            connection_pool.close().await;
            tracing::info!("Database connection pool closed");
        }
    }

    fn pool(&self) -> Result<&Pool<Postgres>, ApplicationError> {
        self.connection_pool.as_ref().ok_or_else(|| {
            tracing::error!("No database connection available");
            ApplicationError::new(ErrorType::DatabaseError, "No database connection available".to_string())
        })
    }

    async fn acquire(&self, message: &str) -> Result<PoolConnection<Postgres>, ApplicationError> {
        self.pool()?.acquire().await.map_err(|err| {
            tracing::error!("Failed to acquire connection: {err}");
            ApplicationError::new(ErrorType::DatabaseError, message.to_string())
        })
    }

    async fn begin(&self, message: &str) -> Result<Transaction<'static, Postgres>, ApplicationError> {
        self.pool()?.begin().await.map_err(|err| {
            tracing::error!("Failed to begin transaction: {err}");
            ApplicationError::new(ErrorType::DatabaseError, message.to_string())
        })
    }

    async fn commit(transaction: Transaction<'static, Postgres>, message: &str) -> Result<(), ApplicationError> {
        transaction.commit().await.map_err(|err| {
            tracing::error!("Failed to commit transaction: {err}");
            ApplicationError::new(ErrorType::DatabaseError, message.to_string())
        })
    }

    async fn rollback(transaction: Transaction<'static, Postgres>) -> Result<(), ApplicationError> {
        transaction.rollback().await.map_err(|err| {
            tracing::error!("Failed to rollback transaction: {err}");
            ApplicationError::new(ErrorType::DatabaseError, "Failed to rollback transaction".to_string())
        })
    }
}
