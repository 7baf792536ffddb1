use crate::domain::{BookId, book::Book};
use crate::ports::{BookQuery, CatalogStore as CatalogStoreTrait, StoreError, store_error::Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::rows::{contains_pattern, map_row_to_book, quantity_to_db, store_error};

/// CatalogStoreのPostgreSQL実装
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_i64(value: u64, name: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::Corrupted(format!("{} out of range", name)))
}

#[async_trait]
impl CatalogStoreTrait for CatalogStore {
    async fn get(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author, isbn, quantity
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn create(&self, book: Book) -> Result<Book> {
        let row = sqlx::query(
            r#"
            INSERT INTO books (id, title, author, isbn, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, author, isbn, quantity
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(quantity_to_db(book.quantity)?)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        map_row_to_book(&row)
    }

    /// 書籍情報を上書きする（直接修正）
    async fn update(&self, book: Book) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            UPDATE books
            SET title = $2, author = $3, isbn = $4, quantity = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, author, isbn, quantity
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(quantity_to_db(book.quantity)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    /// 書籍を検索する
    ///
    /// 一覧と総件数が食い違わないよう、REPEATABLE READの読み取り専用
    /// トランザクション内で両方を取得する。
    async fn search(&self, query: BookQuery) -> Result<(Vec<Book>, u64)> {
        let pattern = contains_pattern(&query.pattern);
        let limit = to_i64(query.limit, "limit")?;
        let offset = to_i64(query.offset, "offset")?;

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let rows = sqlx::query(
            r#"
            SELECT id, title, author, isbn, quantity
            FROM books
            WHERE title ILIKE $1 ESCAPE '\' OR author ILIKE $1 ESCAPE '\'
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM books
            WHERE title ILIKE $1 ESCAPE '\' OR author ILIKE $1 ESCAPE '\'
            "#,
        )
        .bind(&pattern)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;

        let items = rows.iter().map(map_row_to_book).collect::<Result<Vec<_>>>()?;
        let total = u64::try_from(total)
            .map_err(|_| StoreError::Corrupted(format!("negative count {}", total)))?;
        Ok((items, total))
    }
}
