use crate::domain::{LoanId, UserId, loan::Loan};
use async_trait::async_trait;

use super::store_error::Result;

/// 利用者の貸出履歴の1行（書籍タイトル・著者付き）
///
/// 書籍が削除済みの場合、タイトルと著者は`None`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanHistoryEntry {
    pub loan: Loan,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// 貸出台帳ストアポート（読み取り専用）
///
/// 貸出行の作成・返却は`LendingTransaction`経由でのみ行う。
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// IDで貸出を取得する（返却済みを含む）
    async fn get(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 貸出中の貸出をIDで取得する
    async fn find_open_loan(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 全貸出（貸出日時の新しい順）
    async fn list_all(&self) -> Result<Vec<Loan>>;

    /// 利用者の全貸出（貸出日時の新しい順）
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<LoanHistoryEntry>>;
}
