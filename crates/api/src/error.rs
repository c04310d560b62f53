use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    RateLimited { retry_after_secs: u64 },
    ServiceUnavailable(String),
    Internal,
}

#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl AppError {
    pub fn with_request_id(self, request_id: &str) -> ApiError {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
    }
}

/// Whole minutes left in the window, never less than one.
fn wait_minutes(retry_after_secs: u64) -> u64 {
    retry_after_secs.div_ceil(60).max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut retry_after = None;
        let (status, code, message) = match self.error {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid admin token".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::RateLimited { retry_after_secs } => {
                retry_after = Some(retry_after_secs.max(1));
                let minutes = wait_minutes(retry_after_secs);
                let unit = if minutes == 1 { "minute" } else { "minutes" };
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    format!("Please wait {minutes} {unit} between reports"),
                )
            }
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected error".to_string(),
            ),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                    request_id: self.request_id,
                },
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_with_request_id() {
        let err = AppError::Internal.with_request_id("req_123");
        assert_eq!(err.request_id, "req_123");
    }

    #[test]
    fn test_bad_request_response() {
        rt().block_on(async {
            let err = AppError::BadRequest("missing field".to_string()).with_request_id("req_001");
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "invalid_request");
            assert_eq!(json["error"]["message"], "missing field");
            assert_eq!(json["error"]["request_id"], "req_001");
        });
    }

    #[test]
    fn test_unauthorized_response() {
        rt().block_on(async {
            let response = AppError::Unauthorized.with_request_id("req_002").into_response();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "unauthorized");
        });
    }

    #[test]
    fn test_not_found_response() {
        rt().block_on(async {
            let err = AppError::NotFound("report not found".to_string()).with_request_id("req_004");
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "not_found");
            assert_eq!(json["error"]["message"], "report not found");
        });
    }

    #[test]
    fn test_rate_limited_response() {
        rt().block_on(async {
            let err = AppError::RateLimited {
                retry_after_secs: 59 * 60 + 30,
            }
            .with_request_id("req_005");
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(response.headers()[header::RETRY_AFTER], "3570");

            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "rate_limited");
            assert_eq!(json["error"]["message"], "Please wait 60 minutes between reports");
        });
    }

    #[test]
    fn test_rate_limited_last_minute() {
        rt().block_on(async {
            let response = AppError::RateLimited { retry_after_secs: 0 }
                .with_request_id("req_006")
                .into_response();

            assert_eq!(response.headers()[header::RETRY_AFTER], "1");
            let json = body_json(response).await;
            assert_eq!(json["error"]["message"], "Please wait 1 minute between reports");
        });
    }

    #[test]
    fn test_service_unavailable_response() {
        rt().block_on(async {
            let err = AppError::ServiceUnavailable("push disabled".to_string())
                .with_request_id("req_007");
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "service_unavailable");
        });
    }

    #[test]
    fn test_internal_error_response() {
        rt().block_on(async {
            let response = AppError::Internal.with_request_id("req_008").into_response();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], "internal_error");
            assert_eq!(json["error"]["message"], "Unexpected error");
        });
    }
}
