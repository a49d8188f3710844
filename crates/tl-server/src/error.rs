//! Domain error to HTTP response mapping.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use tl_domain::error::Error;

/// JSON error envelope returned by every failing handler.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error tag.
    pub error: &'static str,
    /// Human-readable detail.
    pub detail: String,
    /// Correlation id, present for internal errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Wrapper turning domain errors into responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let status = match &error {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::AuthRequired { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::SandboxSecurity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ServiceUnavailable { .. } | Error::ResourceExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Transient { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Every unexpected failure gets a correlation id, not just the ones
        // already classified as Internal: a raw database/cache/vector error
        // reaching this boundary must be traceable from the response back to
        // the log line. Internal details stay server-side; the caller gets
        // the tag and the id.
        let (kind, detail, correlation_id) = if status == StatusCode::INTERNAL_SERVER_ERROR {
            let correlation_id = match &error {
                Error::Internal { correlation_id, .. } => correlation_id.clone(),
                _ => Uuid::new_v4().to_string(),
            };
            tracing::error!(
                correlation_id = %correlation_id,
                error = %error,
                "request failed internally"
            );
            ("internal", "internal error".to_owned(), Some(correlation_id))
        } else {
            (error.kind(), error.to_string(), None)
        };

        let retry_after = error.retry_after();
        let body = ErrorBody {
            error: kind,
            detail,
            correlation_id,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(after) = retry_after
            && let Ok(value) = HeaderValue::from_str(&after.as_secs().to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Handler result alias.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[tokio::test]
    async fn database_errors_surface_as_internal_with_a_correlation_id() {
        let response = ApiError(Error::database("connection pool exhausted")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal");
        assert_eq!(body["detail"], "internal error");
        let correlation_id = body["correlation_id"].as_str().unwrap_or_default();
        assert_eq!(correlation_id.len(), 36);
        // The raw failure text never leaks to the caller.
        assert!(!body.to_string().contains("connection pool"));
    }

    #[tokio::test]
    async fn internal_errors_keep_their_original_correlation_id() {
        let error = Error::internal("boom");
        let expected = match &error {
            Error::Internal { correlation_id, .. } => correlation_id.clone(),
            _ => String::new(),
        };
        let response = ApiError(error).into_response();
        let body = body_json(response).await;
        assert_eq!(body["correlation_id"], expected.as_str());
    }

    #[tokio::test]
    async fn expected_errors_pass_through_without_a_correlation_id() {
        let response = ApiError(Error::not_found("trend 123")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "not_found");
        assert!(body.get("correlation_id").is_none());

        let response = ApiError(Error::service_unavailable("qdrant")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn rate_limited_carries_retry_after() {
        let response = ApiError(Error::rate_limited_after(
            "hourly budget exhausted",
            std::time::Duration::from_secs(120),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("120")
        );
    }
}
