use thiserror::Error;

/// 書籍入力のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookValidationError {
    /// 必須項目が欠けている
    #[error("{0} is required")]
    MissingField(&'static str),
    /// 冊数が不正（登録時は1以上、修正時は0以上）
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseLoanError {
    /// 既に返却済み
    #[error("loan already returned")]
    AlreadyClosed,
}
