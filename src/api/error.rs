use crate::application::lending::LendingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    /// アプリケーション層のエラー
    Lending(LendingError),
    /// リクエストの形式不正（JSON・パス・クエリの解析失敗）
    BadRequest(String),
    /// 呼び出し元の識別情報がない
    Unauthenticated,
    /// 呼び出し元のロールに権限がない
    Forbidden,
}

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError::Lending(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Caller identity is missing or invalid".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Caller role is not allowed to perform this operation".to_string(),
            ),
            ApiError::Lending(err) => {
                let status = match &err {
                    // 400 Bad Request - 入力不正
                    LendingError::Validation(_) => StatusCode::BAD_REQUEST,

                    // 404 Not Found - リクエストされたリソースが存在しない
                    LendingError::BookNotFound
                    | LendingError::LoanNotFound
                    | LendingError::LoanNotFoundOrAlreadyReturned => StatusCode::NOT_FOUND,

                    // 409 Conflict - 現在の在庫・貸出状況と両立しない
                    LendingError::BookUnavailable | LendingError::BookHasOpenLoans { .. } => {
                        StatusCode::CONFLICT
                    }

                    // 503 Service Unavailable - 競合またはストレージ障害
                    // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                    LendingError::OperationFailed(e) => {
                        tracing::error!(error = ?e, "Lending operation failed");
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                };
                (status, err.code(), err.to_string())
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
