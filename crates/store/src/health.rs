//! Database health monitoring for the `GET /health` endpoint.

use sqlx::PgPool;

/// Connection pool statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

impl PoolStats {
    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle as u32)
    }
}

pub struct HealthMonitor {
    pool: PgPool,
}

impl HealthMonitor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("select 1").execute(&self.pool).await.is_ok()
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_subtracts_idle_from_size() {
        let stats = PoolStats { size: 10, idle: 3 };
        assert_eq!(stats.active(), 7);
    }

    #[test]
    fn active_is_zero_when_all_idle() {
        let stats = PoolStats { size: 10, idle: 10 };
        assert_eq!(stats.active(), 0);
    }
}
