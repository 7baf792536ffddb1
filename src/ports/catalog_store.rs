use crate::domain::{BookId, book::Book};
use async_trait::async_trait;

use super::store_error::Result;

/// 書籍検索の条件（ページングはオフセット方式）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
    /// タイトルまたは著者への部分一致パターン（空なら全件）
    pub pattern: String,
    pub offset: u64,
    pub limit: u64,
}

/// カタログストアポート
///
/// Book行を所有する。貸出に伴う冊数の増減はここには無く、
/// `LendingTransaction` からのみ行える。
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// IDで書籍を取得する
    async fn get(&self, book_id: BookId) -> Result<Option<Book>>;

    /// 書籍を新規登録する
    async fn create(&self, book: Book) -> Result<Book>;

    /// 書籍情報を上書きする
    ///
    /// 対象が存在しない場合は`None`。
    async fn update(&self, book: Book) -> Result<Option<Book>>;

    /// 書籍を検索する
    ///
    /// 大文字小文字を区別しない部分一致、ID昇順。
    /// 一覧と総件数は同一スナップショットから読む。
    async fn search(&self, query: BookQuery) -> Result<(Vec<Book>, u64)>;
}
