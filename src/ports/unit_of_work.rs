use crate::domain::{
    BookId, LoanId,
    loan::{ClosedLoan, OpenLoan},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store_error::Result;

/// 条件付き減算の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// 1冊減らした（減算後の冊数）
    Decremented { remaining: u32 },
    /// 残り0冊のため減らさなかった
    Unavailable,
    /// 書籍が存在しない
    NotFound,
}

/// 条件付き返却の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed(ClosedLoan),
    /// 存在しないか、既に返却済み
    NotOpen,
}

/// 作業単位ポート
///
/// 書籍と貸出をまたぐ変更を1つのトランザクションにまとめる。
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// トランザクションを開始する
    ///
    /// ロック取得は設定されたタイムアウトで打ち切られ、`StoreError::Conflict`になる。
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>>;
}

/// 貸出トランザクション
///
/// `commit`せずにドロップすると、それまでの変更はすべて破棄される。
#[async_trait]
pub trait LendingTransaction: Send {
    /// 冊数を1減らす（冊数が1以上のときのみ、不可分な条件付き更新）
    async fn decrement_availability(&mut self, book_id: BookId) -> Result<Decrement>;

    /// 冊数を1増やす。書籍が存在しない場合は`false`
    async fn increment_availability(&mut self, book_id: BookId) -> Result<bool>;

    /// 書籍行をロックする。存在しない場合は`false`
    async fn lock_book(&mut self, book_id: BookId) -> Result<bool>;

    /// 書籍行を削除する。存在しない場合は`false`
    async fn delete_book(&mut self, book_id: BookId) -> Result<bool>;

    /// 貸出中の貸出を記録する
    async fn open_loan(&mut self, loan: OpenLoan) -> Result<OpenLoan>;

    /// 貸出中であれば返却済みにする（不可分な条件付き更新）
    async fn close_loan(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<CloseOutcome>;

    /// 書籍の貸出中件数
    async fn count_open_loans(&mut self, book_id: BookId) -> Result<u64>;

    /// 変更を確定する
    async fn commit(self: Box<Self>) -> Result<()>;
}
