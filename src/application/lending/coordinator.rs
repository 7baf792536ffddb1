use crate::application::dependencies::{RetryPolicy, ServiceDependencies};
use crate::domain::{
    self, BookId,
    commands::{IssueBook, ReturnBook},
    loan::{ClosedLoan, OpenLoan},
};
use crate::ports::{CloseOutcome, Decrement};
use std::future::Future;

use super::errors::{LendingError, Result};

/// 作業単位を競合時に限り再実行する
///
/// 競合したトランザクションは全体がロールバックされているため、
/// 再実行しても二重の貸出・返却は起こらない。
/// 上限回数に達したら最後の`OperationFailed`を返す。
async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut tried = 0;

    loop {
        tried += 1;
        match attempt().await {
            Err(err) if err.is_conflict() && tried < max_attempts => {
                let delay = policy.delay_after(tried);
                tracing::warn!(
                    operation,
                    attempt = tried,
                    delay_ms = delay.as_millis() as u64,
                    "unit of work conflicted, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(LendingError::OperationFailed(e)) => {
                tracing::error!(operation, attempt = tried, error = %e, "unit of work failed");
                return Err(LendingError::OperationFailed(e));
            }
            result => return result,
        }
    }
}

async fn try_issue(deps: &ServiceDependencies, cmd: &IssueBook) -> Result<OpenLoan> {
    let mut tx = deps
        .unit_of_work
        .begin()
        .await
        .map_err(LendingError::OperationFailed)?;

    // 1-2. 存在確認と在庫確認を兼ねた条件付き減算
    // 失敗時はtxがドロップされロールバックされる
    let remaining = match tx
        .decrement_availability(cmd.book_id)
        .await
        .map_err(LendingError::OperationFailed)?
    {
        Decrement::Decremented { remaining } => remaining,
        Decrement::NotFound => return Err(LendingError::BookNotFound),
        Decrement::Unavailable => return Err(LendingError::BookUnavailable),
    };

    // 3. 同じトランザクション内で貸出を記録
    let loan = domain::loan::issue_loan(cmd.book_id, cmd.user_id, cmd.issued_at);
    let loan = tx
        .open_loan(loan)
        .await
        .map_err(LendingError::OperationFailed)?;

    tx.commit().await.map_err(LendingError::OperationFailed)?;

    tracing::debug!(loan_id = %loan.loan_id, remaining, "copy taken");
    Ok(loan)
}

/// 書籍を貸し出す
///
/// ビジネスルール：
/// - 書籍が存在すること
/// - 貸出可能な冊数が1以上であること
///
/// 冊数の減算と貸出の記録は1つのトランザクションで確定する。
/// 減算は「冊数が1以上なら1減らす」という単一の条件付き更新なので、
/// 同じ書籍への同時貸出でも冊数は負にならない。
///
/// # 冪等性
///
/// **警告**: この関数は冪等ではない。呼び出すたびに別の貸出が作られる。
/// `OperationFailed`の後に再試行する場合は、先に貸出台帳を確認すること。
///
/// # エラー
/// - BookNotFound, BookUnavailable
/// - OperationFailed: 競合が再試行上限を超えた、またはストレージ障害
#[tracing::instrument(skip_all, fields(book_id = %cmd.book_id, user_id = %cmd.user_id))]
pub async fn issue_book(deps: &ServiceDependencies, cmd: IssueBook) -> Result<OpenLoan> {
    let cmd = &cmd;
    let loan = with_retry(deps.retry_policy, "issue_book", move || try_issue(deps, cmd)).await?;
    tracing::info!(loan_id = %loan.loan_id, "book issued");
    Ok(loan)
}

async fn try_return(deps: &ServiceDependencies, cmd: &ReturnBook) -> Result<ClosedLoan> {
    let mut tx = deps
        .unit_of_work
        .begin()
        .await
        .map_err(LendingError::OperationFailed)?;

    // 1. 貸出中の場合のみ返却済みにする（条件付き更新）
    let closed = match tx
        .close_loan(cmd.loan_id, cmd.returned_at)
        .await
        .map_err(LendingError::OperationFailed)?
    {
        CloseOutcome::Closed(closed) => closed,
        CloseOutcome::NotOpen => return Err(LendingError::LoanNotFoundOrAlreadyReturned),
    };

    // 2. 同じトランザクション内で冊数を戻す
    let restored = tx
        .increment_availability(closed.book_id)
        .await
        .map_err(LendingError::OperationFailed)?;
    if !restored {
        return Err(LendingError::BookNotFound);
    }

    tx.commit().await.map_err(LendingError::OperationFailed)?;
    Ok(closed)
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 貸出が存在し、貸出中であること
/// - 同じ貸出の2回目の返却は失敗する（冊数は1回分しか戻らない）
///
/// 冊数は有効な貸出の返却を通じてのみ増えるため、
/// 増加回数が貸出回数を超えることはない。
/// 冪等な結果を持つので、`OperationFailed`の後はそのまま再試行してよい。
#[tracing::instrument(skip_all, fields(loan_id = %cmd.loan_id))]
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<ClosedLoan> {
    let cmd = &cmd;
    let closed =
        with_retry(deps.retry_policy, "return_book", move || try_return(deps, cmd)).await?;
    tracing::info!(book_id = %closed.book_id, "book returned");
    Ok(closed)
}

async fn try_withdraw(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    let mut tx = deps
        .unit_of_work
        .begin()
        .await
        .map_err(LendingError::OperationFailed)?;

    // 書籍行をロックしてから貸出中件数を数える（並行する貸出と直列化される）
    let exists = tx
        .lock_book(book_id)
        .await
        .map_err(LendingError::OperationFailed)?;
    if !exists {
        return Err(LendingError::BookNotFound);
    }

    let open_loans = tx
        .count_open_loans(book_id)
        .await
        .map_err(LendingError::OperationFailed)?;
    if open_loans > 0 {
        return Err(LendingError::BookHasOpenLoans { open_loans });
    }

    let deleted = tx
        .delete_book(book_id)
        .await
        .map_err(LendingError::OperationFailed)?;
    if !deleted {
        return Err(LendingError::BookNotFound);
    }

    tx.commit().await.map_err(LendingError::OperationFailed)?;
    Ok(())
}

/// 書籍をカタログから削除する
///
/// ビジネスルール：
/// - 貸出中の貸出がある書籍は削除できない（`BookHasOpenLoans`）
/// - 返却済みの貸出は台帳に残り、書籍IDの参照を保持する
#[tracing::instrument(skip_all, fields(book_id = %book_id))]
pub async fn withdraw_book(deps: &ServiceDependencies, book_id: BookId) -> Result<()> {
    with_retry(deps.retry_policy, "withdraw_book", move || {
        try_withdraw(deps, book_id)
    })
    .await?;
    tracing::info!("book withdrawn");
    Ok(())
}
