use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coordinator_core::{CoordinatorError, ErrorKind};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("协调器错误: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源: {0}")]
    NotFound(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        match self {
            ApiError::Coordinator(err) => match err.kind() {
                ErrorKind::NotFound => {
                    let error_type = match err {
                        CoordinatorError::WorkerNotFound { .. } => "WORKER_NOT_FOUND",
                        CoordinatorError::AssignmentNotFound { .. } => "ASSIGNMENT_NOT_FOUND",
                        CoordinatorError::SuperStudyNotFound { .. } => "SUPER_STUDY_NOT_FOUND",
                        _ => "NOT_FOUND",
                    };
                    (StatusCode::NOT_FOUND, error_type, false)
                }
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", false),
                ErrorKind::TransientStore => {
                    (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", true)
                }
                ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", false),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, retryable) = self.parts();

        // 内部细节只写日志，不返回给调用方
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("请求处理失败: {}", self);
            "系统内部错误".to_string()
        } else {
            if retryable {
                error!("存储暂不可用: {}", self);
            }
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "retryable": retryable,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = ApiError::from(CoordinatorError::AssignmentNotFound {
            id: "a-1".to_string(),
        });
        assert_eq!(error.parts(), (StatusCode::NOT_FOUND, "ASSIGNMENT_NOT_FOUND", false));
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let error = ApiError::from(CoordinatorError::validation("networkId 不能为空"));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_failure_is_retryable_503() {
        let error = ApiError::from(CoordinatorError::DatabaseOperation("磁盘已满".to_string()));
        let (status, _, retryable) = error.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(retryable);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let error = ApiError::Internal("boom".to_string());
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error = ApiError::from(CoordinatorError::Serialization("bad".to_string()));
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_display() {
        let error = ApiError::BadRequest("缺少字段".to_string());
        assert_eq!(error.to_string(), "请求参数错误: 缺少字段");
    }
}
