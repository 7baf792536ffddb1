use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 書籍ID - カタログ管理コンテキストの集約ID
///
/// UUIDv7で採番するため、ID昇順は登録順と一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 貸出ID - 貸出台帳の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 利用者ID - 認証コンテキストから渡される不透明な識別子
///
/// 貸出コンテキストは利用者の詳細を知らない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 在庫数エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// 貸出可能な冊数が残っていない
    #[error("no copies left")]
    Exhausted,
    /// 負の冊数は表現できない
    #[error("quantity must not be negative (got {0})")]
    Negative(i64),
    /// 上限を超えた
    #[error("quantity out of range")]
    Overflow,
}

/// 貸出可能冊数
///
/// 不変条件：0以上`Quantity::MAX`以下。
/// 上限は保存先のINTEGER列に合わせる。
/// 型で負の値を作れないようにし、減算は `take_one` 経由でのみ行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);
    pub const MAX: Quantity = Quantity(i32::MAX as u32);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_exhausted(&self) -> bool {
        self.0 == 0
    }

    /// 1冊貸し出す
    ///
    /// # エラー
    /// 残り0冊の場合は`QuantityError::Exhausted`を返す
    pub fn take_one(self) -> Result<Self, QuantityError> {
        self.0
            .checked_sub(1)
            .map(Self)
            .ok_or(QuantityError::Exhausted)
    }

    /// 1冊返却する
    pub fn put_back(self) -> Result<Self, QuantityError> {
        if self >= Self::MAX {
            return Err(QuantityError::Overflow);
        }
        Ok(Self(self.0 + 1))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(QuantityError::Negative(value));
        }
        if value > i64::from(Self::MAX.0) {
            return Err(QuantityError::Overflow);
        }
        Ok(Self(value as u32))
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        i64::from(quantity.0)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
