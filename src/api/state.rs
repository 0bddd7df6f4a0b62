use crate::service::submissions::SubmissionsService;

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The submissions service for handling submission operations.
     */
    pub submissions_service: SubmissionsService,
}

/**
 * Creates a new instance of `AppState`.
 *
 * # Arguments
 * `submissions_service`: The submissions service, owning the injected connection pool.
 */
impl AppState {
    pub fn new(submissions_service: SubmissionsService) -> Self {
        AppState { submissions_service }
    }
}
