use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::query::BookPage;
use crate::domain::{
    book::Book,
    loan::{ClosedLoan, Loan, OpenLoan},
};
use crate::ports::LoanHistoryEntry;

/// 書籍一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct SearchBooksQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

/// 貸出リクエスト
#[derive(Debug, Deserialize)]
pub struct IssueBookRequest {
    pub book_id: Uuid,
    pub user_id: Uuid,
}

/// 返却リクエスト
#[derive(Debug, Deserialize)]
pub struct ReturnBookRequest {
    #[serde(alias = "issue_id")]
    pub loan_id: Uuid,
}

/// 書籍レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub quantity: u32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            quantity: book.quantity.value(),
        }
    }
}

/// 書籍一覧レスポンス（GET /api/books）
#[derive(Debug, Serialize, Deserialize)]
pub struct BookPageResponse {
    pub books: Vec<BookResponse>,
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

impl From<BookPage> for BookPageResponse {
    fn from(page: BookPage) -> Self {
        Self {
            books: page.items.into_iter().map(BookResponse::from).collect(),
            total_count: page.total_count,
            total_pages: page.total_pages,
            current_page: page.current_page,
        }
    }
}

/// 書籍の登録・修正レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BookChangedResponse {
    pub message: String,
    pub book: BookResponse,
}

/// 貸出レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        let status = if loan.is_open() { "open" } else { "closed" };
        Self {
            id: loan.loan_id().value(),
            book_id: loan.book_id().value(),
            user_id: loan.user_id().value(),
            issued_at: loan.issued_at(),
            returned_at: loan.returned_at(),
            status: status.to_string(),
        }
    }
}

impl From<OpenLoan> for LoanResponse {
    fn from(loan: OpenLoan) -> Self {
        Loan::from(loan).into()
    }
}

impl From<ClosedLoan> for LoanResponse {
    fn from(loan: ClosedLoan) -> Self {
        Loan::from(loan).into()
    }
}

/// 貸出・返却レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanChangedResponse {
    pub message: String,
    pub loan: LoanResponse,
}

/// 利用者の貸出履歴レスポンス（書籍タイトル・著者付き）
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanHistoryResponse {
    #[serde(flatten)]
    pub loan: LoanResponse,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl From<LoanHistoryEntry> for LoanHistoryResponse {
    fn from(entry: LoanHistoryEntry) -> Self {
        Self {
            loan: entry.loan.into(),
            title: entry.title,
            author: entry.author,
        }
    }
}

/// 削除などペイロードを持たない成功レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
