use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, CloseLoanError, LoanId, UserId};

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// Loan集約の共通フィールド
///
/// 貸出中・返却済みの両状態で共有されるコアデータ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCore {
    // 識別子
    pub loan_id: LoanId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub user_id: UserId,

    pub issued_at: DateTime<Utc>,
}

/// 貸出中状態（returned_atなし）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for OpenLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却済み状態
///
/// ビジネスルール：
/// - returned_atが必須（型で保証）
/// - これ以上の状態遷移はない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedLoan {
    #[serde(flatten)]
    pub core: LoanCore,
    pub returned_at: DateTime<Utc>,
}

impl std::ops::Deref for ClosedLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// Loan集約 - 1冊の書籍の1回の貸出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Loan {
    Open(OpenLoan),
    Closed(ClosedLoan),
}

impl Loan {
    /// 永続化された行から状態を復元する
    pub fn from_parts(core: LoanCore, returned_at: Option<DateTime<Utc>>) -> Self {
        match returned_at {
            None => Loan::Open(OpenLoan { core }),
            Some(returned_at) => Loan::Closed(ClosedLoan { core, returned_at }),
        }
    }

    pub fn core(&self) -> &LoanCore {
        match self {
            Loan::Open(open) => &open.core,
            Loan::Closed(closed) => &closed.core,
        }
    }

    pub fn loan_id(&self) -> LoanId {
        self.core().loan_id
    }

    pub fn book_id(&self) -> BookId {
        self.core().book_id
    }

    pub fn user_id(&self) -> UserId {
        self.core().user_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.core().issued_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Loan::Open(_) => None,
            Loan::Closed(closed) => Some(closed.returned_at),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Loan::Open(_))
    }
}

impl From<OpenLoan> for Loan {
    fn from(loan: OpenLoan) -> Self {
        Loan::Open(loan)
    }
}

impl From<ClosedLoan> for Loan {
    fn from(loan: ClosedLoan) -> Self {
        Loan::Closed(loan)
    }
}

/// 純粋関数：書籍を貸し出す
///
/// 貸出は冪等ではない。呼び出すたびに別の貸出が作られる。
pub fn issue_loan(book_id: BookId, user_id: UserId, issued_at: DateTime<Utc>) -> OpenLoan {
    OpenLoan {
        core: LoanCore {
            loan_id: LoanId::new(),
            book_id,
            user_id,
            issued_at,
        },
    }
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - 貸出中の貸出のみ返却できる
/// - 返却は1回限り（2回目は`AlreadyClosed`）
pub fn close_loan(loan: Loan, returned_at: DateTime<Utc>) -> Result<ClosedLoan, CloseLoanError> {
    match loan {
        Loan::Open(open) => Ok(ClosedLoan {
            core: open.core,
            returned_at,
        }),
        Loan::Closed(_) => Err(CloseLoanError::AlreadyClosed),
    }
}
