use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::User;
use crate::store::StoreError;

/// Источник учётных записей покупателей (их ведёт внешний сервис).
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_active(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
impl AccountDirectory for sqlx::PgPool {
    async fn find_active(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_active_by_email(email, self).await?)
    }
}

/// Фиксированный список аккаунтов для тестов и запуска без БД.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts(pub Vec<User>);

#[async_trait]
impl AccountDirectory for StaticAccounts {
    async fn find_active(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .0
            .iter()
            .find(|u| u.is_active && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub name: String,
}

/// Необязательный аккаунт покупателя. Без заголовка Authorization заказ
/// оформляется анонимно; неверные учётные данные дают 401.
#[derive(Debug, Clone)]
pub struct BuyerAccount(pub Option<AuthUser>);

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for BuyerAccount {
    type Rejection = BookingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>
    ) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(BuyerAccount(None));
        };

        let (email, password) = auth_header
            .to_str()
            .ok()
            .and_then(parse_basic)
            .ok_or(BookingError::Unauthorized)?;

        let user = state
            .accounts
            .find_active(&email)
            .await?
            .ok_or(BookingError::Unauthorized)?;

        // Проверяем пароль по bcrypt-хешу
        if !user.verify_password(&password) {
            return Err(BookingError::Unauthorized);
        }

        Ok(BuyerAccount(Some(AuthUser {
            user_id: user.id,
            email: user.email,
            name: user.name,
        })))
    }
}

/// Разбирает `Basic base64(email:password)`.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (email, password) = credentials.split_once(':')?;
    if email.is_empty() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}
