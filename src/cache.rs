use redis::AsyncCommands;
use tracing::info;

use crate::redis_client::RedisClient;

// Кеш сериализованных схем залов. Display-only: движок бронирования кеш
// никогда не читает, допустимо отставание до инвалидации.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    // Получить сериализованную схему зала
    pub async fn get_layout(&self, event_id: i64) -> Option<String> {
        let mut conn = self.redis.conn.clone();
        conn.get(format!("layout:{}", event_id)).await.ok()
    }

    // Сохранить схему зала в кеш
    pub async fn store_layout(&self, event_id: i64, json: &str) {
        let mut conn = self.redis.conn.clone();
        let key = format!("layout:{}", event_id);
        // Если Redis недоступен — просто пропускаем, кеш не критичен
        let _: Result<(), _> = conn.set_ex(key, json, 86400).await; // 24 часа
    }

    // Инвалидировать кеш схемы после любой мутации сетки
    pub async fn invalidate_layout(&self, event_id: i64) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(format!("layout:{}", event_id)).await;
        info!("Invalidated layout cache for event {}", event_id);
    }
}
