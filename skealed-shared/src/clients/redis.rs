use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Short-lived coordination keys: in-flight claims and per-address cooldowns.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let conn = redis::Client::open(url)?.get_connection_manager().await?;
        tracing::info!("connected to Redis");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.map(|_| ())
    }

    /// Takes `key` for `ttl` unless it is already held. Returns whether this call took it.
    pub async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    pub async fn release(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.del(key).await
    }

    /// Seconds until a held `key` expires. `None` when it is free.
    pub async fn remaining(&self, key: &str) -> Result<Option<u64>, redis::RedisError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(seconds_left(ttl))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// TTL replies: -2 missing key, -1 no expiry.
fn seconds_left(ttl: i64) -> Option<u64> {
    match ttl {
        -2 => None,
        -1 => Some(0),
        n => u64::try_from(n).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_never_zero() {
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
    }

    #[test]
    fn ttl_replies_map_to_remaining_seconds() {
        assert_eq!(seconds_left(-2), None);
        assert_eq!(seconds_left(-1), Some(0));
        assert_eq!(seconds_left(42), Some(42));
    }
}
