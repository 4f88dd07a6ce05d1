//! Distributed task locks used to de-duplicate background work across
//! server replicas: `set_lock` is a SET-if-absent-with-expiry, `release` an
//! unconditional delete, matching `SET key val NX EX ttl` semantics on
//! Redis and a process-local equivalent for the `standalone` profile.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait TaskLock: Send + Sync {
    /// Attempts to acquire `key` for `ttl`. Returns `true` if this call
    /// acquired it, `false` if someone else already holds it.
    async fn set_lock(&self, key: &str, ttl: Duration) -> Result<bool>;

    async fn release(&self, key: &str) -> Result<()>;
}

pub mod in_memory {
    use std::collections::HashMap;

    use tokio::sync::Mutex;
    use tokio::time::Instant;

    use super::*;

    /// A process-local map of `key -> expires_at`, with expired entries
    /// swept lazily on the next `set_lock` call for that key rather than by
    /// a background sweeper — there is no cross-process state to diverge
    /// from.
    #[derive(Default)]
    pub struct InMemoryTaskLock {
        held: Mutex<HashMap<String, Instant>>,
    }

    impl InMemoryTaskLock {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl TaskLock for InMemoryTaskLock {
        async fn set_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
            let mut held = self.held.lock().await;
            let now = Instant::now();
            if let Some(expires_at) = held.get(key) {
                if *expires_at > now {
                    return Ok(false);
                }
            }
            held.insert(key.to_string(), now + ttl);
            Ok(true)
        }

        async fn release(&self, key: &str) -> Result<()> {
            self.held.lock().await.remove(key);
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn second_acquire_fails_while_first_holds_the_lock() {
            let lock = InMemoryTaskLock::new();
            assert!(lock.set_lock("table:1", Duration::from_secs(60)).await.unwrap());
            assert!(!lock.set_lock("table:1", Duration::from_secs(60)).await.unwrap());
        }

        #[tokio::test]
        async fn lock_can_be_reacquired_after_release() {
            let lock = InMemoryTaskLock::new();
            assert!(lock.set_lock("table:1", Duration::from_secs(60)).await.unwrap());
            lock.release("table:1").await.unwrap();
            assert!(lock.set_lock("table:1", Duration::from_secs(60)).await.unwrap());
        }

        #[tokio::test]
        async fn lock_can_be_reacquired_once_its_ttl_elapses() {
            let lock = InMemoryTaskLock::new();
            assert!(lock.set_lock("table:1", Duration::from_millis(10)).await.unwrap());
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(lock.set_lock("table:1", Duration::from_secs(60)).await.unwrap());
        }

        #[tokio::test]
        async fn distinct_keys_do_not_contend() {
            let lock = InMemoryTaskLock::new();
            assert!(lock.set_lock("table:1", Duration::from_secs(60)).await.unwrap());
            assert!(lock.set_lock("table:2", Duration::from_secs(60)).await.unwrap());
        }
    }
}

#[cfg(feature = "redis")]
pub mod redis_backed {
    use redis::AsyncCommands;

    use super::*;
    use crate::error::AppError;

    pub struct RedisTaskLock {
        manager: redis::aio::ConnectionManager,
    }

    impl RedisTaskLock {
        pub fn new(manager: redis::aio::ConnectionManager) -> Self {
            RedisTaskLock { manager }
        }
    }

    #[async_trait]
    impl TaskLock for RedisTaskLock {
        async fn set_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
            let mut conn = self.manager.clone();
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(1)
                .arg("NX")
                .arg("EX")
                .arg(ttl.as_secs())
                .query_async(&mut conn)
                .await
                .map_err(AppError::from)?;
            Ok(reply.is_some())
        }

        async fn release(&self, key: &str) -> Result<()> {
            let mut conn = self.manager.clone();
            conn.del::<_, ()>(key).await.map_err(AppError::from)
        }
    }
}
