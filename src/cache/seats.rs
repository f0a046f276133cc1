use crate::cache::CacheService;
use crate::models::SeatView;
use redis::AsyncCommands;
use tracing::{debug, warn};

fn generation_key(event_id: i64) -> String {
    format!("seatmap:{}:gen", event_id)
}

fn seat_map_key(event_id: i64, generation: u64) -> String {
    format!("seatmap:{}:v{}", event_id, generation)
}

/// Результат чтения карты мест из кеша.
#[derive(Debug)]
pub enum CachedSeatMap {
    Hit(Vec<SeatView>),
    /// Промах. Карту, прочитанную из стора после этого, можно положить под
    /// указанное поколение; `None` значит кеш выключен или Redis недоступен.
    Miss(Option<u64>),
}

impl CacheService {
    // Поколение читается до похода в стор: если холд закоммитится между чтением
    // и записью, инвалидация сдвинет поколение и устаревшая карта не будет прочитана
    pub async fn get_seat_map(&self, event_id: i64) -> CachedSeatMap {
        let Some(mut conn) = self.conn.clone() else {
            return CachedSeatMap::Miss(None);
        };

        let generation: Option<u64> = match conn.get(generation_key(event_id)).await {
            Ok(generation) => generation,
            Err(e) => {
                warn!("Seat map generation read failed for event {}: {}", event_id, e);
                return CachedSeatMap::Miss(None);
            }
        };
        let generation = generation.unwrap_or(0);

        let data: Option<String> = match conn.get(seat_map_key(event_id, generation)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Seat map cache read failed for event {}: {}", event_id, e);
                return CachedSeatMap::Miss(None);
            }
        };

        match data.and_then(|d| serde_json::from_str(&d).ok()) {
            Some(seats) => {
                debug!("Seat map for event {} served from cache (v{})", event_id, generation);
                CachedSeatMap::Hit(seats)
            }
            None => CachedSeatMap::Miss(Some(generation)),
        }
    }

    pub async fn put_seat_map(&self, event_id: i64, generation: u64, seats: &[SeatView]) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let Ok(data) = serde_json::to_string(seats) else {
            return;
        };

        let result: Result<(), redis::RedisError> = conn
            .set_ex(seat_map_key(event_id, generation), data, self.ttl_seconds.max(1))
            .await;
        if let Err(e) = result {
            warn!("Seat map cache write failed for event {}: {}", event_id, e);
        }
    }

    // Сбросить кеш после любого изменения мест события: старые версии доживают TTL
    pub async fn invalidate_seats(&self, event_id: i64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        let result: Result<u64, redis::RedisError> = conn.incr(generation_key(event_id), 1).await;
        if let Err(e) = result {
            warn!("Seat map cache invalidation failed for event {}: {}", event_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatStatus;

    fn view(status: SeatStatus) -> SeatView {
        SeatView { seat_id: 1, row: 1, seat: 1, zone: "A".into(), status, price: Some(100.0) }
    }

    #[test]
    fn keys_are_scoped_by_event_and_generation() {
        assert_eq!(generation_key(42), "seatmap:42:gen");
        assert_eq!(seat_map_key(42, 3), "seatmap:42:v3");
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = CacheService::disabled();
        cache.put_seat_map(1, 0, &[view(SeatStatus::Available)]).await;
        assert!(matches!(cache.get_seat_map(1).await, CachedSeatMap::Miss(None)));
        cache.invalidate_seats(1).await;
    }

    /// Нужен живой Redis: TEST_REDIS_URL.
    #[tokio::test]
    async fn map_read_before_invalidation_is_never_served() {
        let Ok(url) = std::env::var("TEST_REDIS_URL") else {
            eprintln!("TEST_REDIS_URL not set, skipping");
            return;
        };
        let cache = CacheService::connect(&url, 60).await.unwrap();
        let event_id = 900_000 + (uuid::Uuid::new_v4().as_u128() % 100_000) as i64;

        let CachedSeatMap::Miss(Some(generation)) = cache.get_seat_map(event_id).await else {
            panic!("expected a miss with a generation");
        };

        // холд коммитится, пока читатель ещё не положил карту
        cache.invalidate_seats(event_id).await;
        cache.put_seat_map(event_id, generation, &[view(SeatStatus::Available)]).await;
        assert!(matches!(cache.get_seat_map(event_id).await, CachedSeatMap::Miss(Some(_))));

        let CachedSeatMap::Miss(Some(fresh)) = cache.get_seat_map(event_id).await else {
            panic!("expected a miss with a generation");
        };
        cache.put_seat_map(event_id, fresh, &[view(SeatStatus::Hold)]).await;
        match cache.get_seat_map(event_id).await {
            CachedSeatMap::Hit(seats) => assert_eq!(seats[0].status, SeatStatus::Hold),
            other => panic!("expected a hit, got {:?}", other),
        }
    }
}
