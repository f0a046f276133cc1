use serde::Serialize;
use sqlx::FromRow;

// Учётные записи ведёт внешний сервис, здесь только чтение
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub is_active: bool,
}

impl User {
    // Найти активного пользователя по email
    pub async fn find_active_by_email(email: &str, pool: &sqlx::PgPool) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, name, is_active FROM users WHERE LOWER(email) = LOWER($1) AND is_active = true"
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    // Проверить пароль по bcrypt-хешу
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_password_checks_bcrypt_hash() {
        let user = User {
            id: 1,
            email: "buyer@example.com".into(),
            password_hash: bcrypt::hash("s3cret", 4).unwrap(),
            name: "Buyer".into(),
            is_active: true,
        };
        assert!(user.verify_password("s3cret"));
        assert!(!user.verify_password("wrong"));
    }
}
