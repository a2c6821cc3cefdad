use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sqlx::MySqlPool;

use crate::model::employee::EmployeeProfile;
use crate::store::StoreError;

/// Resolves employee ids to the profile data the ledger snapshots.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn lookup(&self, employee_id: u64) -> Result<Option<EmployeeProfile>, StoreError>;
}

/// Employees table lookup fronted by a bounded TTL cache. Misses are not
/// cached, so a newly hired employee is visible immediately.
pub struct MySqlEmployeeDirectory {
    pool: MySqlPool,
    cache: Cache<u64, EmployeeProfile>,
}

impl MySqlEmployeeDirectory {
    pub fn new(pool: MySqlPool, cache: Cache<u64, EmployeeProfile>) -> Self {
        Self { pool, cache }
    }
}

pub fn profile_cache(max_capacity: u64, ttl: Duration) -> Cache<u64, EmployeeProfile> {
    Cache::builder()
        .max_capacity(max_capacity)
        .time_to_live(ttl)
        .build()
}

#[async_trait]
impl EmployeeDirectory for MySqlEmployeeDirectory {
    async fn lookup(&self, employee_id: u64) -> Result<Option<EmployeeProfile>, StoreError> {
        if let Some(profile) = self.cache.get(&employee_id).await {
            return Ok(Some(profile));
        }

        let profile = sqlx::query_as::<_, EmployeeProfile>(
            r#"
            SELECT id, first_name, last_name
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(profile) = &profile {
            self.cache.insert(employee_id, profile.clone()).await;
        }

        Ok(profile)
    }
}

#[cfg(test)]
pub struct StaticDirectory(pub std::collections::HashMap<u64, EmployeeProfile>);

#[cfg(test)]
impl StaticDirectory {
    pub fn with(profiles: &[(u64, &str, &str)]) -> Self {
        Self(
            profiles
                .iter()
                .map(|(id, first, last)| {
                    (
                        *id,
                        EmployeeProfile {
                            id: *id,
                            first_name: first.to_string(),
                            last_name: last.to_string(),
                        },
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
#[async_trait]
impl EmployeeDirectory for StaticDirectory {
    async fn lookup(&self, employee_id: u64) -> Result<Option<EmployeeProfile>, StoreError> {
        Ok(self.0.get(&employee_id).cloned())
    }
}
