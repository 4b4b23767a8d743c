use std::borrow::Cow;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub type Result<T> = core::result::Result<T, Error>;

/// 字段级校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(Cow<'static, str>),

    /// 重复的名称或保存记录，对外表现为 400
    #[error("{0}")]
    Conflict(Cow<'static, str>),

    #[error("{0}")]
    NotFound(Cow<'static, str>),

    #[error("{0}")]
    Forbidden(Cow<'static, str>),

    #[error("invalid authorization user")]
    Unauthorized,

    #[error("Validation error, make sure body is correct")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// 数据库唯一约束冲突（SQLSTATE 23505）转换为 [`Error::Conflict`]，其余保持原样
    pub fn conflict_on_unique(msg: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
        move |e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::conflict(msg),
            _ => Error::Sqlx(e),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Conflict(_) | Error::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Sqlx(_) | Error::Config(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) | Error::Conflict(_) | Error::Validation(_) => "BAD_REQUEST_ERROR",
            Error::NotFound(_) => "NOT_FOUND_ERROR",
            Error::Forbidden(_) => "FORBIDDEN_ERROR",
            Error::Unauthorized => "UNAUTHORIZED_ERROR",
            Error::Sqlx(_) => "DB_ERROR",
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} failed on '{}' rule", e.code)),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Error::Validation(fields)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let message = match &self {
            Error::Sqlx(e) => {
                tracing::error!(%e, "sqlx error");
                "Internal Server Error".to_string()
            }
            Error::Config(e) => {
                tracing::error!(%e, "config error");
                "Internal Server Error".to_string()
            }
            Error::Io(e) => {
                tracing::error!(%e, "io error");
                "Internal Server Error".to_string()
            }
            Error::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "Internal Server Error".to_string()
            }
            other => {
                tracing::debug!(error = %other, code, "request rejected");
                other.to_string()
            }
        };

        let errors = match self {
            Error::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorBody {
            status: status.as_u16(),
            message,
            code,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use validator::Validate;

    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_conflict_renders_as_bad_request() {
        let resp = Error::conflict("already exists").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["status"], 400);
        assert_eq!(json["code"], "BAD_REQUEST_ERROR");
        assert_eq!(json["message"], "already exists");
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_storage_error_is_opaque() {
        let resp = Error::Sqlx(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(resp).await;
        assert_eq!(json["code"], "DB_ERROR");
        assert_eq!(json["message"], "Internal Server Error");
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, max = 3, message = "name too long"))]
        name: String,
    }

    #[tokio::test]
    async fn test_validation_errors_are_listed_per_field() {
        let err: Error = Sample {
            name: "abcdef".into(),
        }
        .validate()
        .unwrap_err()
        .into();

        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = body_json(resp).await;
        assert_eq!(json["errors"][0]["field"], "name");
        assert_eq!(json["errors"][0]["message"], "name too long");
    }
}
