use crate::domain::{
    BookId, LoanId, Quantity, UserId,
    book::Book,
    loan::{Loan, LoanCore},
};
use crate::ports::{StoreError, store_error::Result};
use sqlx::{Row, postgres::PgRow};

/// SQLSTATE: serialization_failure / deadlock_detected / lock_not_available
const CONFLICT_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

/// sqlxのエラーをストアエラーに分類する
///
/// 再試行で解消し得るもの（直列化失敗・デッドロック・ロック待ちタイムアウト）のみ`Conflict`。
pub(super) fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db
            .code()
            .is_some_and(|code| CONFLICT_CODES.contains(&code.as_ref()))
        {
            return StoreError::Conflict(Box::new(err));
        }
    }
    StoreError::Backend(Box::new(err))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name).map_err(store_error)
}

/// PostgreSQLの行データをBookに変換する
///
/// quantityが負の行はCHECK制約で存在しないはずだが、見つかれば`Corrupted`。
pub(super) fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let quantity: i32 = column(row, "quantity")?;
    let quantity = Quantity::try_from(quantity)
        .map_err(|e| StoreError::Corrupted(format!("books.quantity: {}", e)))?;

    Ok(Book {
        book_id: BookId::from_uuid(column(row, "id")?),
        title: column(row, "title")?,
        author: column(row, "author")?,
        isbn: column(row, "isbn")?,
        quantity,
    })
}

/// PostgreSQLの行データをLoanに変換する
///
/// returned_atの有無で貸出中・返却済みの状態を復元する。
pub(super) fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    let core = LoanCore {
        loan_id: LoanId::from_uuid(column(row, "id")?),
        book_id: BookId::from_uuid(column(row, "book_id")?),
        user_id: UserId::from_uuid(column(row, "user_id")?),
        issued_at: column(row, "issued_at")?,
    };
    Ok(Loan::from_parts(core, column(row, "returned_at")?))
}

/// 冊数をINTEGER列に収まる値に変換する
pub(super) fn quantity_to_db(quantity: Quantity) -> Result<i32> {
    i32::try_from(quantity.value())
        .map_err(|_| StoreError::Corrupted(format!("quantity {} exceeds column range", quantity)))
}

/// ILIKE用にワイルドカードをエスケープし、部分一致パターンにする
pub(super) fn contains_pattern(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for ch in pattern.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
