use crate::application::{
    ServiceDependencies,
    catalog::{
        get_book as execute_get_book, register_book as execute_register_book,
        revise_book as execute_revise_book,
    },
    lending::{
        issue_book as execute_issue_book, return_book as execute_return_book,
        withdraw_book as execute_withdraw_book,
    },
    query::{self, BookSearch},
};
use crate::domain::{
    BookId, LoanId, UserId,
    book::{BookRevision, NewBook},
    commands::{IssueBook, ReturnBook},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    caller::{Caller, Role},
    error::ApiError,
    types::{
        BookChangedResponse, BookPageResponse, BookResponse, IssueBookRequest,
        LoanChangedResponse, LoanHistoryResponse, LoanResponse, MessageResponse,
        ReturnBookRequest, SearchBooksQuery,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

const STAFF: &[Role] = &[Role::Admin, Role::Librarian];

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn path_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

// ============================================================================
// Catalog handlers
// ============================================================================

/// GET /api/books - 書籍を検索
///
/// クエリパラメータ:
/// - search: タイトルまたは著者の部分一致（大文字小文字を区別しない）
/// - page: ページ番号（1始まり、既定1）
/// - limit: 1ページの件数（既定10）
pub async fn search_books(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    params: Result<Query<SearchBooksQuery>, QueryRejection>,
) -> Result<Json<BookPageResponse>, ApiError> {
    caller.require(STAFF)?;
    let Query(params) =
        params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let search = BookSearch {
        pattern: params.search,
        page: params.page,
        page_size: params.limit,
    };
    let page = query::search_books(&state.service_deps, search).await?;

    Ok(Json(page.into()))
}

/// POST /api/books - 書籍を登録
pub async fn register_book(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<NewBook>, JsonRejection>,
) -> Result<(StatusCode, Json<BookChangedResponse>), ApiError> {
    caller.require(STAFF)?;
    let input = json_body(body)?;

    let book = execute_register_book(&state.service_deps, input).await?;

    let response = BookChangedResponse {
        message: "Book added successfully".to_string(),
        book: book.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/books/:id - 書籍詳細をIDで取得
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    caller.require(STAFF)?;
    let book_id = BookId::from_uuid(path_id(path)?);

    let book = execute_get_book(&state.service_deps, book_id).await?;

    Ok(Json(book.into()))
}

/// PUT /api/books/:id - 書籍情報を修正
///
/// 全フィールドを置き換える。冊数の直接修正（0を含む）も受け付ける。
pub async fn revise_book(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<BookRevision>, JsonRejection>,
) -> Result<Json<BookChangedResponse>, ApiError> {
    caller.require(STAFF)?;
    let book_id = BookId::from_uuid(path_id(path)?);
    let revision = json_body(body)?;

    let book = execute_revise_book(&state.service_deps, book_id, revision).await?;

    Ok(Json(BookChangedResponse {
        message: "Book updated successfully".to_string(),
        book: book.into(),
    }))
}

/// DELETE /api/books/:id - 書籍を削除
///
/// 貸出中の貸出が残っている場合は409を返す。
pub async fn withdraw_book(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let book_id = BookId::from_uuid(path_id(path)?);

    execute_withdraw_book(&state.service_deps, book_id).await?;

    Ok(Json(MessageResponse::new("Book deleted successfully")))
}

// ============================================================================
// Lending handlers
// ============================================================================

/// POST /api/books/issue - 書籍を貸し出す
///
/// 強制されるビジネスルール:
/// - 書籍が存在すること
/// - 貸出可能な冊数が1以上であること
pub async fn issue_book(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<IssueBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LoanChangedResponse>), ApiError> {
    caller.require(&[Role::Librarian])?;
    let req = json_body(body)?;

    let cmd = IssueBook {
        book_id: BookId::from_uuid(req.book_id),
        user_id: UserId::from_uuid(req.user_id),
        issued_at: chrono::Utc::now(),
    };
    let loan = execute_issue_book(&state.service_deps, cmd).await?;

    let response = LoanChangedResponse {
        message: "Book issued successfully".to_string(),
        loan: loan.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/books/return - 書籍を返却
///
/// 強制されるビジネスルール:
/// - 貸出が存在し、貸出中であること
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<ReturnBookRequest>, JsonRejection>,
) -> Result<Json<LoanChangedResponse>, ApiError> {
    caller.require(&[Role::Librarian])?;
    let req = json_body(body)?;

    let cmd = ReturnBook {
        loan_id: LoanId::from_uuid(req.loan_id),
        returned_at: chrono::Utc::now(),
    };
    let loan = execute_return_book(&state.service_deps, cmd).await?;

    Ok(Json(LoanChangedResponse {
        message: "Book returned successfully".to_string(),
        loan: loan.into(),
    }))
}

// ============================================================================
// Ledger query handlers
// ============================================================================

/// GET /api/books/fetchissued - 全貸出を取得（新しい順）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    caller.require(STAFF)?;

    let loans = query::list_loans(&state.service_deps).await?;

    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

/// GET /api/books/issuedbooks/:user_id - 利用者の貸出履歴を取得
pub async fn loans_for_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<LoanHistoryResponse>>, ApiError> {
    let user_id = UserId::from_uuid(path_id(path)?);
    tracing::debug!(caller = %caller.user_id, user_id = %user_id, "loan history requested");

    let history = query::loans_for_user(&state.service_deps, user_id).await?;

    Ok(Json(
        history.into_iter().map(LoanHistoryResponse::from).collect(),
    ))
}
