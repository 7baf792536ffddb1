use crate::domain::{LoanId, UserId, loan::Loan};
use crate::ports::{LedgerStore as LedgerStoreTrait, LoanHistoryEntry, store_error::Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::rows::{map_row_to_loan, store_error};

/// LedgerStoreのPostgreSQL実装（読み取り専用）
///
/// 各クエリは単一文なので、コミット済みのトランザクションの結果だけを見る。
/// 貸出と冊数の片方だけが反映された状態は観測されない。
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStoreTrait for LedgerStore {
    async fn get(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT id, book_id, user_id, issued_at, returned_at
            FROM loans
            WHERE id = $1
            "#,
        )
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn find_open_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT id, book_id, user_id, issued_at, returned_at
            FROM loans
            WHERE id = $1 AND returned_at IS NULL
            "#,
        )
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Loan>> {
        let rows = sqlx::query(
            r#"
            SELECT id, book_id, user_id, issued_at, returned_at
            FROM loans
            ORDER BY issued_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter().map(map_row_to_loan).collect()
    }

    /// 利用者の貸出履歴（書籍タイトル・著者付き）
    ///
    /// 削除済み書籍の貸出も残すためLEFT JOINを使う。
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<LoanHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT
                l.id,
                l.book_id,
                l.user_id,
                l.issued_at,
                l.returned_at,
                b.title,
                b.author
            FROM loans l
            LEFT JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1
            ORDER BY l.issued_at DESC, l.id DESC
            "#,
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(|row| -> Result<LoanHistoryEntry> {
                Ok(LoanHistoryEntry {
                    loan: map_row_to_loan(row)?,
                    title: row.try_get("title").map_err(store_error)?,
                    author: row.try_get("author").map_err(store_error)?,
                })
            })
            .collect()
    }
}
