use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Field name to the messages raised for it; `__all__` holds form-wide errors.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error body returned by every failing storefront endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Invalid form data",
    "details": {"quantity": ["Chair on warehouse: 3\nYou can select maximum 3 of Chair"]},
    "request_id": "5f0c6c1e2a8b4d0f9e3a7c4b1d2e6f80",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Reason phrase of the status code
    #[schema(example = "Not Found")]
    pub error: String,
    #[schema(example = "Not found: Item 42 not found")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected form; rendered with per-field `details`
    #[error("Invalid form data")]
    InvalidForm(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A write lost a race against a concurrent one
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::warn!(%detail, "unique constraint violated");
                ServiceError::Conflict("Resource was modified concurrently".to_string())
            }
            _ => ServiceError::DatabaseError(err),
        }
    }
}

/// Flattens validator output into field name to messages.
pub fn field_errors(err: &validator::ValidationErrors) -> FieldErrors {
    err.field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("Invalid value ({})", e.code),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::InvalidForm(field_errors(&err))
    }
}

impl ServiceError {
    /// Single-field form error.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ServiceError::InvalidForm(FieldErrors::from([(field.to_string(), vec![message.into()])]))
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::InternalError(_)
                | Self::HashError(_)
                | Self::StorageError(_)
                | Self::Other(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidForm(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to clients; server-side failures are not described.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            e if e.is_internal() => "Internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            tracing::error!(error = %self, "request failed");
        }

        let message = self.response_message();
        let details = match self {
            Self::InvalidForm(fields) => Some(fields),
            _ => None,
        };
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details,
            request_id: crate::tracing::current_request_id().map(|id| id.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::body::to_bytes;
    use sea_orm::ConnectionTrait;
    use validator::Validate;

    async fn body_of(response: Response) -> ErrorResponse {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn error_body_carries_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("Item 1 not found".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let payload = body_of(response).await;
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "Not found: Item 1 not found");
        assert!(payload.details.is_none());
    }

    #[tokio::test]
    async fn form_errors_are_returned_as_details() {
        let response = ServiceError::field("email", "This email used").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let payload = body_of(response).await;
        let details = payload.details.expect("details");
        assert_eq!(details["email"], vec!["This email used".to_string()]);
        assert_eq!(payload.message, "Invalid form data");
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            ServiceError::BadRequest("Activation link is invalid!".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::from(anyhow::anyhow!("x")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn unique_violations_become_conflicts() {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        db.execute_unprepared("CREATE TABLE tags (name TEXT NOT NULL UNIQUE)")
            .await
            .unwrap();
        db.execute_unprepared("INSERT INTO tags (name) VALUES ('oak')")
            .await
            .unwrap();

        let duplicate = db
            .execute_unprepared("INSERT INTO tags (name) VALUES ('oak')")
            .await
            .unwrap_err();
        let err = ServiceError::from(duplicate);
        assert_matches!(err, ServiceError::Conflict(_));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let missing_table = db
            .execute_unprepared("INSERT INTO nowhere VALUES (1)")
            .await
            .unwrap_err();
        assert_matches!(ServiceError::from(missing_table), ServiceError::DatabaseError(_));
    }

    #[test]
    fn anyhow_errors_are_masked() {
        let err = ServiceError::from(anyhow::anyhow!("disk full at /var/media"));
        assert_eq!(err.response_message(), "Internal server error");
    }

    #[test]
    fn internal_failures_are_not_described() {
        assert_eq!(
            ServiceError::HashError("salt".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::StorageError("/media: permission denied".into()).response_message(),
            "Internal server error"
        );
    }

    #[derive(Validate)]
    struct QuantityForm {
        #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
        quantity: i32,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn validation_errors_become_field_map() {
        let form = QuantityForm {
            quantity: 0,
            email: "nope".into(),
        };
        let err: ServiceError = form.validate().unwrap_err().into();
        let ServiceError::InvalidForm(fields) = err else {
            panic!("expected a form error");
        };
        assert_eq!(
            fields["quantity"],
            vec!["Ensure this value is greater than or equal to 1.".to_string()]
        );
        assert_eq!(fields["email"], vec!["Invalid value (email)".to_string()]);
    }
}
