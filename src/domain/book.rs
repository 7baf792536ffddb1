use serde::{Deserialize, Serialize};

use super::{BookId, BookValidationError, Quantity, QuantityError};

/// Book集約 - カタログ上の1タイトル
///
/// `quantity` は現在貸出可能な冊数。
/// 貸出・返却による増減は貸出コーディネーターだけが行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub quantity: Quantity,
}

/// 未検証の書籍登録入力
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub quantity: Option<i64>,
}

/// 未検証の書籍修正入力
///
/// 登録と同じく全項目必須（部分更新はしない）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookRevision {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub quantity: Option<i64>,
}

fn required_text(field: &'static str, value: Option<&str>) -> Result<String, BookValidationError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(BookValidationError::MissingField(field)),
    }
}

fn required_quantity(value: Option<i64>) -> Result<Quantity, BookValidationError> {
    let raw = value.ok_or(BookValidationError::MissingField("quantity"))?;
    Quantity::try_from(raw).map_err(|_| BookValidationError::InvalidQuantity(raw))
}

/// 純粋関数：書籍を登録する
///
/// ビジネスルール：
/// - タイトル、著者、ISBNは必須（空白のみは不可）
/// - 冊数は1以上
pub fn register_book(input: &NewBook) -> Result<Book, BookValidationError> {
    let title = required_text("title", input.title.as_deref())?;
    let author = required_text("author", input.author.as_deref())?;
    let isbn = required_text("isbn", input.isbn.as_deref())?;
    let quantity = required_quantity(input.quantity)?;

    if quantity.is_exhausted() {
        return Err(BookValidationError::InvalidQuantity(0));
    }

    Ok(Book {
        book_id: BookId::new(),
        title,
        author,
        isbn,
        quantity,
    })
}

/// 純粋関数：書籍情報を修正する
///
/// 冊数の直接修正は0を許容する（全冊貸出中の棚卸し結果など）。
/// この修正は貸出台帳との整合性の対象外。
pub fn revise_book(book: &Book, revision: &BookRevision) -> Result<Book, BookValidationError> {
    let title = required_text("title", revision.title.as_deref())?;
    let author = required_text("author", revision.author.as_deref())?;
    let isbn = required_text("isbn", revision.isbn.as_deref())?;
    let quantity = required_quantity(revision.quantity)?;

    Ok(Book {
        book_id: book.book_id,
        title,
        author,
        isbn,
        quantity,
    })
}

/// 純粋関数：1冊を貸出に回す
pub fn take_copy(book: &Book) -> Result<Book, QuantityError> {
    Ok(Book {
        quantity: book.quantity.take_one()?,
        ..book.clone()
    })
}

/// 純粋関数：1冊を棚に戻す
pub fn put_back_copy(book: &Book) -> Result<Book, QuantityError> {
    Ok(Book {
        quantity: book.quantity.put_back()?,
        ..book.clone()
    })
}

/// 検索パターンに一致するか（タイトルまたは著者の大文字小文字を区別しない部分一致）
pub fn matches_pattern(book: &Book, pattern: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let pattern = pattern.to_lowercase();
    book.title.to_lowercase().contains(&pattern) || book.author.to_lowercase().contains(&pattern)
}
