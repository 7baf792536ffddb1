use crate::ports::{CatalogStore, LedgerStore, UnitOfWork};
use std::sync::Arc;
use std::time::Duration;

/// 作業単位の再試行方針
///
/// 競合（`StoreError::Conflict`）のみ再試行する。待ち時間は試行ごとに倍になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `attempt`回目（1始まり）の失敗後に待つ時間
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(20),
        }
    }
}

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
/// ストレージはここから明示的に注入され、グローバルな状態は持たない。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub catalog_store: Arc<dyn CatalogStore>,
    pub ledger_store: Arc<dyn LedgerStore>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
    pub retry_policy: RetryPolicy,
}
