use crate::domain::BookValidationError;
use crate::ports::StoreError;
use thiserror::Error;

/// 貸出管理アプリケーション層のエラー
///
/// どのバリアントも安定したエラーコード（`code()`）に対応する。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 入力不正（呼び出し側の誤り。修正せずに再試行しても失敗する）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 書籍が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 貸出が存在しない
    #[error("Loan not found")]
    LoanNotFound,

    /// 貸出可能な冊数が残っていない
    #[error("Book is not available for loan")]
    BookUnavailable,

    /// 貸出が存在しないか既に返却済み
    #[error("Loan not found or already returned")]
    LoanNotFoundOrAlreadyReturned,

    /// 貸出中の貸出がある書籍は削除できない
    #[error("Book has {open_loans} open loan(s)")]
    BookHasOpenLoans { open_loans: u64 },

    /// トランザクション競合またはストレージ障害
    #[error("Operation failed")]
    OperationFailed(#[source] StoreError),
}

impl LendingError {
    /// API境界で返す安定したエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            LendingError::Validation(_) => "VALIDATION_ERROR",
            LendingError::BookNotFound => "BOOK_NOT_FOUND",
            LendingError::LoanNotFound => "LOAN_NOT_FOUND",
            LendingError::BookUnavailable => "BOOK_UNAVAILABLE",
            LendingError::LoanNotFoundOrAlreadyReturned => "LOAN_NOT_FOUND_OR_ALREADY_RETURNED",
            LendingError::BookHasOpenLoans { .. } => "BOOK_HAS_OPEN_LOANS",
            LendingError::OperationFailed(_) => "OPERATION_FAILED",
        }
    }

    /// 同じ入力で再試行して成功し得るか
    ///
    /// 貸出（issue）は冪等ではないため、再試行前に結果を確認すること。
    pub fn is_retryable(&self) -> bool {
        matches!(self, LendingError::OperationFailed(_))
    }

    /// 作業単位を再実行すべき競合か
    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, LendingError::OperationFailed(e) if e.is_conflict())
    }
}

impl From<BookValidationError> for LendingError {
    fn from(err: BookValidationError) -> Self {
        LendingError::Validation(err.to_string())
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;
