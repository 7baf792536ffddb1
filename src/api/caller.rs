use crate::domain::UserId;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::error::ApiError;

/// 上流の認証層が付与する利用者IDヘッダー
pub const USER_ID_HEADER: &str = "x-user-id";
/// 上流の認証層が付与するロールヘッダー
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// 利用者ロール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Librarian,
    Customer,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "librarian" => Ok(Role::Librarian),
            "customer" => Ok(Role::Customer),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// 呼び出し元
///
/// 認証自体は上流で済んでいる前提で、ヘッダーの値をそのまま信頼する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    /// ロールによる権限チェック
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, role = ?self.role, "caller role rejected");
            Err(ApiError::Forbidden)
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(UserId::from_uuid)
            .ok_or(ApiError::Unauthenticated)?;

        let role = header(parts, USER_ROLE_HEADER)
            .and_then(|value| value.parse::<Role>().ok())
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Caller { user_id, role })
    }
}
