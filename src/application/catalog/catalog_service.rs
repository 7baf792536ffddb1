use crate::application::dependencies::ServiceDependencies;
use crate::application::lending::{LendingError, Result};
use crate::domain::{
    self, BookId,
    book::{Book, BookRevision, NewBook},
};

/// 書籍を登録する
///
/// ビジネスルール：
/// - タイトル、著者、ISBN、冊数はすべて必須
/// - 冊数は1以上
pub async fn register_book(deps: &ServiceDependencies, input: NewBook) -> Result<Book> {
    let book = domain::book::register_book(&input)?;

    let book = deps
        .catalog_store
        .create(book)
        .await
        .map_err(LendingError::OperationFailed)?;

    tracing::info!(book_id = %book.book_id, quantity = %book.quantity, "book registered");
    Ok(book)
}

/// 書籍情報を修正する
///
/// 冊数の直接修正を含む。貸出台帳との整合性チェックは行わない。
pub async fn revise_book(
    deps: &ServiceDependencies,
    book_id: BookId,
    revision: BookRevision,
) -> Result<Book> {
    let current = get_book(deps, book_id).await?;
    let revised = domain::book::revise_book(&current, &revision)?;

    let book = deps
        .catalog_store
        .update(revised)
        .await
        .map_err(LendingError::OperationFailed)?
        .ok_or(LendingError::BookNotFound)?;

    tracing::info!(book_id = %book.book_id, "book revised");
    Ok(book)
}

/// IDで書籍を取得する
pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.catalog_store
        .get(book_id)
        .await
        .map_err(LendingError::OperationFailed)?
        .ok_or(LendingError::BookNotFound)
}
