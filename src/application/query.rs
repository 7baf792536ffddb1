use crate::application::dependencies::ServiceDependencies;
use crate::application::lending::{LendingError, Result};
use crate::domain::{LoanId, UserId, book::Book, loan::Loan};
use crate::ports::{BookQuery, LoanHistoryEntry};

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_PAGE_SIZE: u64 = 10;

/// 書籍検索の入力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSearch {
    pub pattern: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// 書籍検索の結果（1ページ分）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookPage {
    pub items: Vec<Book>,
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

/// 書籍を検索する
///
/// タイトルまたは著者への大文字小文字を区別しない部分一致、ID昇順。
/// 一致0件はエラーではなく空のページを返す。
pub async fn search_books(deps: &ServiceDependencies, search: BookSearch) -> Result<BookPage> {
    let page = search.page.unwrap_or(DEFAULT_PAGE);
    let page_size = search.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page == 0 {
        return Err(LendingError::Validation("page must be at least 1".to_string()));
    }
    if page_size == 0 {
        return Err(LendingError::Validation("limit must be at least 1".to_string()));
    }

    // OFFSET/LIMITはBIGINTとして渡す
    if i64::try_from(page_size).is_err() {
        return Err(LendingError::Validation("limit is out of range".to_string()));
    }
    let offset = (page - 1)
        .checked_mul(page_size)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| LendingError::Validation("page is out of range".to_string()))?;

    let query = BookQuery {
        pattern: search.pattern.unwrap_or_default(),
        offset,
        limit: page_size,
    };

    let (items, total_count) = deps
        .catalog_store
        .search(query)
        .await
        .map_err(LendingError::OperationFailed)?;

    Ok(BookPage {
        items,
        total_count,
        total_pages: total_count.div_ceil(page_size),
        current_page: page,
    })
}

/// 全貸出を取得する（貸出日時の新しい順）
pub async fn list_loans(deps: &ServiceDependencies) -> Result<Vec<Loan>> {
    deps.ledger_store
        .list_all()
        .await
        .map_err(LendingError::OperationFailed)
}

/// 利用者の貸出履歴を取得する（書籍タイトル・著者付き、新しい順）
pub async fn loans_for_user(
    deps: &ServiceDependencies,
    user_id: UserId,
) -> Result<Vec<LoanHistoryEntry>> {
    deps.ledger_store
        .list_for_user(user_id)
        .await
        .map_err(LendingError::OperationFailed)
}

/// IDで貸出を取得する
pub async fn get_loan(deps: &ServiceDependencies, loan_id: LoanId) -> Result<Loan> {
    deps.ledger_store
        .get(loan_id)
        .await
        .map_err(LendingError::OperationFailed)?
        .ok_or(LendingError::LoanNotFound)
}

/// 貸出中の貸出をIDで取得する
///
/// 返却済みの場合も`LoanNotFoundOrAlreadyReturned`。
pub async fn find_open_loan(deps: &ServiceDependencies, loan_id: LoanId) -> Result<Loan> {
    deps.ledger_store
        .find_open_loan(loan_id)
        .await
        .map_err(LendingError::OperationFailed)?
        .ok_or(LendingError::LoanNotFoundOrAlreadyReturned)
}
