use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

pub mod seats;

/// Кеш карты мест. Без Redis работает как пустой кеш: всё читается из стора.
#[derive(Clone)]
pub struct CacheService {
    conn: Option<MultiplexedConnection>,
    ttl_seconds: u64,
}

impl CacheService {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis connected, seat map TTL {}s", ttl_seconds);
        Ok(Self { conn: Some(conn), ttl_seconds })
    }

    pub fn disabled() -> Self {
        Self { conn: None, ttl_seconds: 0 }
    }
}
