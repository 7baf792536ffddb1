use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, get_book, issue_book, list_loans, loans_for_user, register_book, return_book,
    revise_book, search_books, withdraw_book,
};

/// 蔵書と貸出の全エンドポイントを持つルーターを作成
///
/// 蔵書:
/// - GET /api/books - 書籍検索（ページ分割）
/// - POST /api/books - 書籍登録
/// - GET /api/books/:id - 書籍詳細
/// - PUT /api/books/:id - 書籍修正
/// - DELETE /api/books/:id - 書籍削除
///
/// 貸出:
/// - POST /api/books/issue - 貸出
/// - POST /api/books/return - 返却
/// - GET /api/books/fetchissued - 全貸出一覧
/// - GET /api/books/issuedbooks/:user_id - 利用者の貸出履歴
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ヘルスチェック
        .route("/health", get(health_check))
        // 蔵書
        .route("/api/books", get(search_books).post(register_book))
        .route(
            "/api/books/:id",
            get(get_book).put(revise_book).delete(withdraw_book),
        )
        // 貸出
        .route("/api/books/issue", post(issue_book))
        .route("/api/books/return", post(return_book))
        .route("/api/books/fetchissued", get(list_loans))
        .route("/api/books/issuedbooks/:user_id", get(loans_for_user))
        // トレーシングミドルウェア
        .layer(TraceLayer::new_for_http())
        // アプリケーション状態
        .with_state(state)
}

/// ヘルスチェック
async fn health_check() -> &'static str {
    "OK"
}
