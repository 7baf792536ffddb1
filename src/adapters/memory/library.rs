use crate::domain::{
    self, BookId, LoanId, UserId,
    book::Book,
    loan::{Loan, OpenLoan},
};
use crate::ports::{
    BookQuery, CatalogStore, CloseOutcome, Decrement, LedgerStore, LendingTransaction,
    LoanHistoryEntry, StoreError, UnitOfWork, store_error::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct LibraryState {
    books: BTreeMap<BookId, Book>,
    loans: BTreeMap<LoanId, Loan>,
}

impl LibraryState {
    fn loans_newest_first(&self) -> Vec<&Loan> {
        let mut loans: Vec<&Loan> = self.loans.values().collect();
        loans.sort_by(|a, b| {
            b.issued_at()
                .cmp(&a.issued_at())
                .then_with(|| b.loan_id().cmp(&a.loan_id()))
        });
        loans
    }
}

/// カタログ・台帳・作業単位のインメモリ実装
///
/// 全状態を1つのミューテックスで保護する。
/// トランザクションはコミットまでロックを保持するので、
/// 読み取り側が途中状態を観測することはない。
/// ロック待ちは`lock_timeout`で打ち切られ`StoreError::Conflict`になる。
#[derive(Clone)]
pub struct InMemoryLibrary {
    state: Arc<Mutex<LibraryState>>,
    lock_timeout: Duration,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(LibraryState::default())),
            lock_timeout,
        }
    }

    async fn lock(&self) -> Result<OwnedMutexGuard<LibraryState>> {
        tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|e| StoreError::Conflict(Box::new(e)))
    }
}

impl Default for InMemoryLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryLibrary {
    async fn get(&self, book_id: BookId) -> Result<Option<Book>> {
        let state = self.lock().await?;
        Ok(state.books.get(&book_id).cloned())
    }

    async fn create(&self, book: Book) -> Result<Book> {
        let mut state = self.lock().await?;
        if state.books.contains_key(&book.book_id) {
            return Err(StoreError::Backend(
                format!("duplicate book id {}", book.book_id).into(),
            ));
        }
        state.books.insert(book.book_id, book.clone());
        Ok(book)
    }

    async fn update(&self, book: Book) -> Result<Option<Book>> {
        let mut state = self.lock().await?;
        match state.books.get_mut(&book.book_id) {
            Some(existing) => {
                *existing = book.clone();
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    async fn search(&self, query: BookQuery) -> Result<(Vec<Book>, u64)> {
        let state = self.lock().await?;
        let matched: Vec<&Book> = state
            .books
            .values()
            .filter(|book| domain::book::matches_pattern(book, &query.pattern))
            .collect();

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((items, total))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLibrary {
    async fn get(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let state = self.lock().await?;
        Ok(state.loans.get(&loan_id).cloned())
    }

    async fn find_open_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let state = self.lock().await?;
        Ok(state.loans.get(&loan_id).filter(|l| l.is_open()).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Loan>> {
        let state = self.lock().await?;
        Ok(state.loans_newest_first().into_iter().cloned().collect())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<LoanHistoryEntry>> {
        let state = self.lock().await?;
        Ok(state
            .loans_newest_first()
            .into_iter()
            .filter(|loan| loan.user_id() == user_id)
            .map(|loan| {
                let book = state.books.get(&loan.book_id());
                LoanHistoryEntry {
                    loan: loan.clone(),
                    title: book.map(|b| b.title.clone()),
                    author: book.map(|b| b.author.clone()),
                }
            })
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryLibrary {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let guard = self.lock().await?;
        Ok(Box::new(MemoryTransaction {
            state: guard,
            undo: Vec::new(),
            committed: false,
        }))
    }
}

/// 取り消し用に保存した変更前の値
enum Undo {
    Book(BookId, Option<Book>),
    Loan(LoanId, Option<Loan>),
}

/// インメモリのトランザクション
///
/// 変更前の値を記録し、コミットされずにドロップされたら逆順に書き戻す。
struct MemoryTransaction {
    state: OwnedMutexGuard<LibraryState>,
    undo: Vec<Undo>,
    committed: bool,
}

impl MemoryTransaction {
    fn write_book(&mut self, book_id: BookId, book: Option<Book>) {
        let previous = match book {
            Some(book) => self.state.books.insert(book_id, book),
            None => self.state.books.remove(&book_id),
        };
        self.undo.push(Undo::Book(book_id, previous));
    }

    fn write_loan(&mut self, loan: Loan) {
        let loan_id = loan.loan_id();
        let previous = self.state.loans.insert(loan_id, loan);
        self.undo.push(Undo::Loan(loan_id, previous));
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::Book(book_id, Some(book)) => {
                    self.state.books.insert(book_id, book);
                }
                Undo::Book(book_id, None) => {
                    self.state.books.remove(&book_id);
                }
                Undo::Loan(loan_id, Some(loan)) => {
                    self.state.loans.insert(loan_id, loan);
                }
                Undo::Loan(loan_id, None) => {
                    self.state.loans.remove(&loan_id);
                }
            }
        }
    }
}

#[async_trait]
impl LendingTransaction for MemoryTransaction {
    async fn decrement_availability(&mut self, book_id: BookId) -> Result<Decrement> {
        let Some(book) = self.state.books.get(&book_id) else {
            return Ok(Decrement::NotFound);
        };
        let Ok(taken) = domain::book::take_copy(book) else {
            return Ok(Decrement::Unavailable);
        };
        let remaining = taken.quantity.value();
        self.write_book(book_id, Some(taken));
        Ok(Decrement::Decremented { remaining })
    }

    async fn increment_availability(&mut self, book_id: BookId) -> Result<bool> {
        let Some(book) = self.state.books.get(&book_id) else {
            return Ok(false);
        };
        let restored = domain::book::put_back_copy(book)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        self.write_book(book_id, Some(restored));
        Ok(true)
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<bool> {
        Ok(self.state.books.contains_key(&book_id))
    }

    async fn delete_book(&mut self, book_id: BookId) -> Result<bool> {
        if !self.state.books.contains_key(&book_id) {
            return Ok(false);
        }
        self.write_book(book_id, None);
        Ok(true)
    }

    async fn open_loan(&mut self, loan: OpenLoan) -> Result<OpenLoan> {
        if self.state.loans.contains_key(&loan.loan_id) {
            return Err(StoreError::Backend(
                format!("duplicate loan id {}", loan.loan_id).into(),
            ));
        }
        self.write_loan(Loan::Open(loan.clone()));
        Ok(loan)
    }

    async fn close_loan(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<CloseOutcome> {
        let Some(loan) = self.state.loans.get(&loan_id).cloned() else {
            return Ok(CloseOutcome::NotOpen);
        };
        match domain::loan::close_loan(loan, returned_at) {
            Ok(closed) => {
                self.write_loan(Loan::Closed(closed.clone()));
                Ok(CloseOutcome::Closed(closed))
            }
            Err(_) => Ok(CloseOutcome::NotOpen),
        }
    }

    async fn count_open_loans(&mut self, book_id: BookId) -> Result<u64> {
        Ok(self
            .state
            .loans
            .values()
            .filter(|loan| loan.is_open() && loan.book_id() == book_id)
            .count() as u64)
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}
