use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rusty_library_lending::adapters::memory::InMemoryLibrary;
use rusty_library_lending::application::{
    lending::{LendingError, issue_book, return_book, withdraw_book},
    query::{self, BookSearch},
};
use rusty_library_lending::domain::{
    BookId, LoanId, UserId,
    commands::{IssueBook, ReturnBook},
    loan::OpenLoan,
};
use rusty_library_lending::ports::{
    CloseOutcome, Decrement, LendingTransaction, StoreError, UnitOfWork, store_error,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

mod common;

use common::{memory_deps, memory_deps_with_unit_of_work, quantity_of, register};

fn issue(book_id: BookId, user_id: UserId) -> IssueBook {
    IssueBook {
        book_id,
        user_id,
        issued_at: Utc::now(),
    }
}

fn give_back(loan_id: LoanId) -> ReturnBook {
    ReturnBook {
        loan_id,
        returned_at: Utc::now(),
    }
}

// ============================================================================
// 障害注入用の作業単位
// ============================================================================

/// 貸出の記録で必ず失敗するトランザクション
struct FailingOpenLoan {
    inner: Box<dyn LendingTransaction>,
}

#[async_trait]
impl LendingTransaction for FailingOpenLoan {
    async fn decrement_availability(&mut self, book_id: BookId) -> store_error::Result<Decrement> {
        self.inner.decrement_availability(book_id).await
    }

    async fn increment_availability(&mut self, book_id: BookId) -> store_error::Result<bool> {
        self.inner.increment_availability(book_id).await
    }

    async fn lock_book(&mut self, book_id: BookId) -> store_error::Result<bool> {
        self.inner.lock_book(book_id).await
    }

    async fn delete_book(&mut self, book_id: BookId) -> store_error::Result<bool> {
        self.inner.delete_book(book_id).await
    }

    async fn open_loan(&mut self, _loan: OpenLoan) -> store_error::Result<OpenLoan> {
        Err(StoreError::Backend("disk full".into()))
    }

    async fn close_loan(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> store_error::Result<CloseOutcome> {
        self.inner.close_loan(loan_id, returned_at).await
    }

    async fn count_open_loans(&mut self, book_id: BookId) -> store_error::Result<u64> {
        self.inner.count_open_loans(book_id).await
    }

    async fn commit(self: Box<Self>) -> store_error::Result<()> {
        self.inner.commit().await
    }
}

/// 貸出の記録で失敗する作業単位
struct BrokenLedger {
    library: InMemoryLibrary,
}

#[async_trait]
impl UnitOfWork for BrokenLedger {
    async fn begin(&self) -> store_error::Result<Box<dyn LendingTransaction>> {
        let inner = self.library.begin().await?;
        Ok(Box::new(FailingOpenLoan { inner }))
    }
}

/// 最初のN回だけ競合を返す作業単位
struct ConflictingBegin {
    library: InMemoryLibrary,
    remaining_conflicts: AtomicU32,
    begins: AtomicU32,
}

#[async_trait]
impl UnitOfWork for ConflictingBegin {
    async fn begin(&self) -> store_error::Result<Box<dyn LendingTransaction>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let left = self.remaining_conflicts.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining_conflicts.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict("could not serialize access".into()));
        }
        self.library.begin().await
    }
}

// ============================================================================
// 貸出・返却
// ============================================================================

#[tokio::test]
async fn test_two_copies_three_borrowers_then_return() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "Dune", 2).await;

    let user_a = UserId::new();
    let user_b = UserId::new();
    let user_c = UserId::new();

    // 1冊目
    let loan_a = issue_book(&deps, issue(book.book_id, user_a)).await.unwrap();
    assert_eq!(loan_a.book_id, book.book_id);
    assert_eq!(loan_a.user_id, user_a);
    let open = query::find_open_loan(&deps, loan_a.loan_id).await.unwrap();
    assert!(open.is_open());
    assert_eq!(quantity_of(&deps, &book).await, 1);
    assert_eq!(query::list_loans(&deps).await.unwrap().len(), 1);

    // 2冊目
    issue_book(&deps, issue(book.book_id, user_b)).await.unwrap();
    assert_eq!(quantity_of(&deps, &book).await, 0);

    // 在庫切れ
    let result = issue_book(&deps, issue(book.book_id, user_c)).await;
    assert!(matches!(result, Err(LendingError::BookUnavailable)));
    assert_eq!(quantity_of(&deps, &book).await, 0);
    assert_eq!(query::list_loans(&deps).await.unwrap().len(), 2);

    // 返却
    let closed = return_book(&deps, give_back(loan_a.loan_id)).await.unwrap();
    assert_eq!(closed.loan_id, loan_a.loan_id);
    assert_eq!(quantity_of(&deps, &book).await, 1);

    let stored = query::get_loan(&deps, loan_a.loan_id).await.unwrap();
    assert!(!stored.is_open());
    assert!(stored.returned_at().is_some());
    assert!(matches!(
        query::find_open_loan(&deps, loan_a.loan_id).await,
        Err(LendingError::LoanNotFoundOrAlreadyReturned)
    ));
}

#[tokio::test]
async fn test_issue_then_return_restores_quantity() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "Solaris", 3).await;

    let loan = issue_book(&deps, issue(book.book_id, UserId::new()))
        .await
        .unwrap();
    return_book(&deps, give_back(loan.loan_id)).await.unwrap();

    assert_eq!(quantity_of(&deps, &book).await, 3);
}

#[tokio::test]
async fn test_second_return_fails_and_increments_once() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "Neuromancer", 1).await;

    let loan = issue_book(&deps, issue(book.book_id, UserId::new()))
        .await
        .unwrap();
    return_book(&deps, give_back(loan.loan_id)).await.unwrap();

    let second = return_book(&deps, give_back(loan.loan_id)).await;
    assert!(matches!(
        second,
        Err(LendingError::LoanNotFoundOrAlreadyReturned)
    ));
    assert_eq!(quantity_of(&deps, &book).await, 1);
}

#[tokio::test]
async fn test_return_unknown_loan_fails() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);

    let result = return_book(&deps, give_back(LoanId::new())).await;

    assert!(matches!(
        result,
        Err(LendingError::LoanNotFoundOrAlreadyReturned)
    ));
}

#[tokio::test]
async fn test_issue_unknown_book_fails() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);

    let result = issue_book(&deps, issue(BookId::new(), UserId::new())).await;

    assert!(matches!(result, Err(LendingError::BookNotFound)));
    assert!(query::list_loans(&deps).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_issue_with_zero_quantity_leaves_state_untouched() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "Ubik", 1).await;
    issue_book(&deps, issue(book.book_id, UserId::new()))
        .await
        .unwrap();

    for _ in 0..3 {
        let result = issue_book(&deps, issue(book.book_id, UserId::new())).await;
        assert!(matches!(result, Err(LendingError::BookUnavailable)));
    }

    assert_eq!(quantity_of(&deps, &book).await, 0);
    assert_eq!(query::list_loans(&deps).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_loan_record_rolls_back_decrement() {
    let library = InMemoryLibrary::new();
    let book = register(&memory_deps(&library), "Blindsight", 2).await;
    let deps = memory_deps_with_unit_of_work(
        &library,
        Arc::new(BrokenLedger {
            library: library.clone(),
        }),
    );

    let result = issue_book(&deps, issue(book.book_id, UserId::new())).await;

    match result {
        Err(err @ LendingError::OperationFailed(_)) => {
            assert_eq!(err.code(), "OPERATION_FAILED");
            // ストレージの詳細はメッセージに含めない
            assert!(!err.to_string().contains("disk full"));
        }
        other => panic!("expected OperationFailed, got {:?}", other),
    }
    assert_eq!(quantity_of(&deps, &book).await, 2);
    assert!(query::list_loans(&deps).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conflicts_are_retried_within_bound() {
    let library = InMemoryLibrary::new();
    let book = register(&memory_deps(&library), "Hyperion", 1).await;
    let unit_of_work = Arc::new(ConflictingBegin {
        library: library.clone(),
        remaining_conflicts: AtomicU32::new(2),
        begins: AtomicU32::new(0),
    });
    let deps = memory_deps_with_unit_of_work(&library, unit_of_work.clone());

    let loan = issue_book(&deps, issue(book.book_id, UserId::new())).await;

    assert!(loan.is_ok());
    assert_eq!(unit_of_work.begins.load(Ordering::SeqCst), 3);
    assert_eq!(quantity_of(&deps, &book).await, 0);
}

#[tokio::test]
async fn test_persistent_conflict_becomes_operation_failed() {
    let library = InMemoryLibrary::new();
    let book = register(&memory_deps(&library), "Hyperion", 1).await;
    let unit_of_work = Arc::new(ConflictingBegin {
        library: library.clone(),
        remaining_conflicts: AtomicU32::new(100),
        begins: AtomicU32::new(0),
    });
    let deps = memory_deps_with_unit_of_work(&library, unit_of_work.clone());

    let result = issue_book(&deps, issue(book.book_id, UserId::new())).await;

    assert!(matches!(result, Err(LendingError::OperationFailed(_))));
    assert!(result.unwrap_err().is_retryable());
    assert_eq!(
        unit_of_work.begins.load(Ordering::SeqCst),
        deps.retry_policy.max_attempts
    );
    assert_eq!(quantity_of(&deps, &book).await, 1);
}

// ============================================================================
// 並行実行
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issues_on_last_copy_yield_one_loan() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "The Left Hand of Darkness", 1).await;

    let attempts = 16;
    let handles: Vec<_> = (0..attempts)
        .map(|_| {
            let deps = deps.clone();
            let cmd = issue(book.book_id, UserId::new());
            tokio::spawn(async move { issue_book(&deps, cmd).await })
        })
        .collect();

    let mut successes = 0;
    for outcome in join_all(handles).await {
        match outcome.unwrap() {
            Ok(_) => successes += 1,
            Err(LendingError::BookUnavailable) | Err(LendingError::OperationFailed(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(quantity_of(&deps, &book).await, 0);
    assert_eq!(query::list_loans(&deps).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_returns_of_same_loan_increment_once() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "Kindred", 1).await;
    let loan = issue_book(&deps, issue(book.book_id, UserId::new()))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let deps = deps.clone();
            let cmd = give_back(loan.loan_id);
            tokio::spawn(async move { return_book(&deps, cmd).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(quantity_of(&deps, &book).await, 1);
}

// ============================================================================
// 書籍の削除
// ============================================================================

#[tokio::test]
async fn test_withdraw_refused_while_loans_are_open() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let book = register(&deps, "Foundation", 2).await;
    let loan = issue_book(&deps, issue(book.book_id, UserId::new()))
        .await
        .unwrap();

    let result = withdraw_book(&deps, book.book_id).await;
    assert!(matches!(
        result,
        Err(LendingError::BookHasOpenLoans { open_loans: 1 })
    ));
    assert_eq!(quantity_of(&deps, &book).await, 1);

    return_book(&deps, give_back(loan.loan_id)).await.unwrap();
    withdraw_book(&deps, book.book_id).await.unwrap();

    let gone = rusty_library_lending::application::catalog::get_book(&deps, book.book_id).await;
    assert!(matches!(gone, Err(LendingError::BookNotFound)));

    // 返却済みの貸出は台帳に残る
    let kept = query::get_loan(&deps, loan.loan_id).await.unwrap();
    assert_eq!(kept.book_id(), book.book_id);
}

#[tokio::test]
async fn test_withdraw_unknown_book_fails() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);

    let result = withdraw_book(&deps, BookId::new()).await;

    assert!(matches!(result, Err(LendingError::BookNotFound)));
}

// ============================================================================
// 照会
// ============================================================================

#[tokio::test]
async fn test_search_without_matches_returns_empty_page() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    register(&deps, "Dune", 1).await;

    let page = query::search_books(
        &deps,
        BookSearch {
            pattern: Some("zzz-no-such-title".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.total_pages, 0);
    assert_eq!(page.current_page, 1);
}

#[tokio::test]
async fn test_search_pages_in_id_order() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let mut registered = Vec::new();
    for title in ["Alpha", "Beta", "Gamma", "Delta", "Epsilon"] {
        registered.push(register(&deps, title, 1).await.book_id);
    }

    let second = query::search_books(
        &deps,
        BookSearch {
            pattern: None,
            page: Some(2),
            page_size: Some(2),
        },
    )
    .await
    .unwrap();

    let ids: Vec<BookId> = second.items.iter().map(|b| b.book_id).collect();
    assert_eq!(ids, registered[2..4].to_vec());
    assert_eq!(second.total_count, 5);
    assert_eq!(second.total_pages, 3);
}

#[tokio::test]
async fn test_search_rejects_page_zero() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);

    let result = query::search_books(
        &deps,
        BookSearch {
            page: Some(0),
            ..Default::default()
        },
    )
    .await;

    assert!(matches!(result, Err(LendingError::Validation(_))));
}

#[tokio::test]
async fn test_user_history_is_newest_first_with_titles() {
    let library = InMemoryLibrary::new();
    let deps = memory_deps(&library);
    let first = register(&deps, "First", 1).await;
    let second = register(&deps, "Second", 1).await;
    let user = UserId::new();
    let other = UserId::new();

    let t0 = Utc::now();
    issue_book(
        &deps,
        IssueBook {
            book_id: first.book_id,
            user_id: user,
            issued_at: t0,
        },
    )
    .await
    .unwrap();
    issue_book(
        &deps,
        IssueBook {
            book_id: second.book_id,
            user_id: user,
            issued_at: t0 + chrono::Duration::seconds(1),
        },
    )
    .await
    .unwrap();
    issue_book(&deps, issue(first.book_id, other)).await.unwrap_err();

    let history = query::loans_for_user(&deps, user).await.unwrap();

    let titles: Vec<Option<String>> = history.iter().map(|h| h.title.clone()).collect();
    assert_eq!(
        titles,
        vec![Some("Second".to_string()), Some("First".to_string())]
    );
    assert!(history.iter().all(|h| h.loan.user_id() == user));
}
