use crate::domain::{
    BookId, LoanId,
    loan::{Loan, OpenLoan},
};
use crate::ports::{
    CloseOutcome, Decrement, LendingTransaction, StoreError, UnitOfWork as UnitOfWorkTrait,
    store_error::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;

use super::rows::{map_row_to_loan, store_error};

/// UnitOfWorkのPostgreSQL実装
///
/// 1つの作業単位 = 1つのデータベーストランザクション（READ COMMITTED）。
/// 冊数の減算・返却は行ロックを取る単一の条件付きUPDATEで行うため、
/// 同じ書籍・同じ貸出への並行操作はここで直列化される。
pub struct UnitOfWork {
    pool: PgPool,
    lock_timeout: Duration,
}

impl UnitOfWork {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl UnitOfWorkTrait for UnitOfWork {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // ロック待ちの上限（このトランザクション内のみ有効）
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        Ok(Box::new(PgLendingTransaction { tx }))
    }
}

/// PostgreSQLの貸出トランザクション
///
/// commitされずにドロップされたsqlxのトランザクションはロールバックされる。
struct PgLendingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTransaction for PgLendingTransaction {
    async fn decrement_availability(&mut self, book_id: BookId) -> Result<Decrement> {
        // 冊数の確認と減算を1文で行う（0冊なら更新されない）
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET quantity = quantity - 1, updated_at = NOW()
            WHERE id = $1 AND quantity > 0
            RETURNING quantity
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        if let Some(remaining) = remaining {
            let remaining = u32::try_from(remaining)
                .map_err(|_| StoreError::Corrupted(format!("books.quantity: {}", remaining)))?;
            return Ok(Decrement::Decremented { remaining });
        }

        // 更新されなかった理由を判別する
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id.value())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(store_error)?;

        Ok(if exists {
            Decrement::Unavailable
        } else {
            Decrement::NotFound
        })
    }

    async fn increment_availability(&mut self, book_id: BookId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET quantity = quantity + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(book_id.value())
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;

        Ok(row.is_some())
    }

    async fn delete_book(&mut self, book_id: BookId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn open_loan(&mut self, loan: OpenLoan) -> Result<OpenLoan> {
        sqlx::query(
            r#"
            INSERT INTO loans (id, book_id, user_id, issued_at, returned_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.book_id.value())
        .bind(loan.user_id.value())
        .bind(loan.issued_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        Ok(loan)
    }

    async fn close_loan(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<CloseOutcome> {
        // 貸出中の行だけを返却済みにする（2回目の返却は0行更新になる）
        let row = sqlx::query(
            r#"
            UPDATE loans
            SET returned_at = $2
            WHERE id = $1 AND returned_at IS NULL
            RETURNING id, book_id, user_id, issued_at, returned_at
            "#,
        )
        .bind(loan_id.value())
        .bind(returned_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(CloseOutcome::NotOpen);
        };

        match map_row_to_loan(&row)? {
            Loan::Closed(closed) => Ok(CloseOutcome::Closed(closed)),
            Loan::Open(_) => Err(StoreError::Corrupted(format!(
                "loan {} still open after close",
                loan_id
            ))),
        }
    }

    async fn count_open_loans(&mut self, book_id: BookId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(book_id.value())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)?;

        u64::try_from(count).map_err(|_| StoreError::Corrupted(format!("negative count {}", count)))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgLendingTransaction { tx } = *self;
        tx.commit().await.map_err(store_error)
    }
}
