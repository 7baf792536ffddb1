use thiserror::Error;

/// ストア層のエラー
///
/// `Conflict` のみ再試行可能。競合したトランザクションは全体がロールバック済み。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 直列化失敗・デッドロック・ロック待ちタイムアウト
    #[error("storage conflict")]
    Conflict(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 永続化された行がドメインの不変条件を満たさない
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// その他のストレージ障害
    #[error("storage backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
