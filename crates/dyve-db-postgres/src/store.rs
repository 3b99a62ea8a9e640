//! PostgreSQL implementation of the lease and hierarchy stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dyve_core::{
    ChildRecord, Clock, Entity, EntityKind, EntityRef, HierarchyStore, Job, LeasePlan, LeaseStore,
    StoreError, SystemClock,
};
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use tracing::{debug, instrument, trace};

use crate::config::PostgresConfig;
use crate::error::{Result, store_error};
use crate::{migrations, pool};

type EntityRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    serde_json::Value,
    Option<DateTime<Utc>>,
);

const SELECT_ENTITY: &str = r#"
    SELECT kind, id, parent_kind, parent_id, info, last_reconciled
    FROM reconcile_entities
"#;

/// Lease and hierarchy store backed by the `reconcile_entities` table.
///
/// Leasing is a single `UPDATE … FROM (SELECT … FOR UPDATE SKIP LOCKED)`
/// statement, so any number of processes may share one database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    plan: LeasePlan,
    clock: Arc<dyn Clock>,
}

impl PostgresStore {
    pub fn new(pool: PgPool, plan: LeasePlan) -> Self {
        Self::with_clock(pool, plan, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, plan: LeasePlan, clock: Arc<dyn Clock>) -> Self {
        Self { pool, plan, clock }
    }

    /// Creates the pool and applies migrations when configured.
    pub async fn connect(config: &PostgresConfig, plan: LeasePlan) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self::new(pool, plan))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn time_to_chrono(t: OffsetDateTime) -> DateTime<Utc> {
        DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond()).unwrap_or_else(Utc::now)
    }

    fn chrono_to_time(t: DateTime<Utc>) -> OffsetDateTime {
        let nanos = i128::from(t.timestamp()) * 1_000_000_000 + i128::from(t.timestamp_subsec_nanos());
        OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn row_to_entity(row: EntityRow) -> Entity {
        let (kind, id, parent_kind, parent_id, info, last_reconciled) = row;
        let parent = match (parent_kind, parent_id) {
            (Some(kind), Some(id)) => Some(EntityRef::new(EntityKind::new(kind), id)),
            _ => None,
        };
        Entity {
            kind: EntityKind::new(kind),
            id,
            parent,
            info,
            last_reconciled: last_reconciled.map(Self::chrono_to_time),
        }
    }

    /// Lease cutoff: entities stamped at or before this instant are eligible.
    fn cutoff(now: OffsetDateTime, older_than: Duration) -> OffsetDateTime {
        time::Duration::try_from(older_than)
            .ok()
            .and_then(|d| now.checked_sub(d))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    async fn lease_kind(
        &self,
        kind: &EntityKind,
        now: OffsetDateTime,
        older_than: Duration,
    ) -> std::result::Result<Option<(String, Option<DateTime<Utc>>)>, StoreError> {
        sqlx_core::query_as::query_as(
            r#"
            UPDATE reconcile_entities AS e
            SET last_reconciled = $3
            FROM (
                SELECT kind, id, last_reconciled
                FROM reconcile_entities
                WHERE kind = $1
                  AND (last_reconciled IS NULL OR last_reconciled <= $2)
                ORDER BY last_reconciled ASC NULLS FIRST, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            ) AS prev
            WHERE e.kind = prev.kind AND e.id = prev.id
            RETURNING e.id, prev.last_reconciled
            "#,
        )
        .bind(kind.as_str())
        .bind(Self::time_to_chrono(Self::cutoff(now, older_than)))
        .bind(Self::time_to_chrono(now))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)
    }
}

#[async_trait]
impl LeaseStore for PostgresStore {
    #[instrument(skip(self))]
    async fn accept_reconcile_job(
        &self,
        older_than: Duration,
    ) -> std::result::Result<Option<Job>, StoreError> {
        let now = self.clock.now();

        for (kind, scope) in self.plan.entries() {
            if let Some((entity_id, previous)) = self.lease_kind(kind, now, older_than).await? {
                trace!(kind = %kind, entity_id = %entity_id, scope = %scope, "lease granted");
                return Ok(Some(Job {
                    scope: scope.clone(),
                    entity_id,
                    last_reconciled: previous.map(Self::chrono_to_time),
                }));
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl HierarchyStore for PostgresStore {
    async fn ensure_root(&self, entity: Entity) -> std::result::Result<(), StoreError> {
        let (parent_kind, parent_id) = match &entity.parent {
            Some(p) => (Some(p.kind.as_str()), Some(p.id.as_str())),
            None => (None, None),
        };
        sqlx_core::query::query(
            r#"
            INSERT INTO reconcile_entities (kind, id, parent_kind, parent_id, info, last_reconciled)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (kind, id) DO NOTHING
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(&entity.id)
        .bind(parent_kind)
        .bind(parent_id)
        .bind(&entity.info)
        .bind(entity.last_reconciled.map(Self::time_to_chrono))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(entity = %entity.reference(), "Root ensured");
        Ok(())
    }

    async fn get(&self, entity: &EntityRef) -> std::result::Result<Option<Entity>, StoreError> {
        let query = format!("{SELECT_ENTITY} WHERE kind = $1 AND id = $2");
        let row: Option<EntityRow> = sqlx_core::query_as::query_as(&query)
            .bind(entity.kind.as_str())
            .bind(&entity.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Self::row_to_entity))
    }

    async fn list(&self, kind: &EntityKind) -> std::result::Result<Vec<Entity>, StoreError> {
        let query = format!("{SELECT_ENTITY} WHERE kind = $1 ORDER BY id");
        let rows: Vec<EntityRow> = sqlx_core::query_as::query_as(&query)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Self::row_to_entity).collect())
    }

    async fn children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
    ) -> std::result::Result<Vec<Entity>, StoreError> {
        let query = format!(
            "{SELECT_ENTITY} WHERE parent_kind = $1 AND parent_id = $2 AND kind = $3 ORDER BY id"
        );
        let rows: Vec<EntityRow> = sqlx_core::query_as::query_as(&query)
            .bind(parent.kind.as_str())
            .bind(&parent.id)
            .bind(child_kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Self::row_to_entity).collect())
    }

    async fn upsert_children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
        children: Vec<ChildRecord>,
    ) -> std::result::Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        for child in &children {
            sqlx_core::query::query(
                r#"
                INSERT INTO reconcile_entities (kind, id, parent_kind, parent_id, info)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (kind, id) DO UPDATE
                SET parent_kind = EXCLUDED.parent_kind,
                    parent_id = EXCLUDED.parent_id,
                    info = EXCLUDED.info,
                    updated_at = NOW()
                WHERE reconcile_entities.info IS DISTINCT FROM EXCLUDED.info
                   OR reconcile_entities.parent_kind IS DISTINCT FROM EXCLUDED.parent_kind
                   OR reconcile_entities.parent_id IS DISTINCT FROM EXCLUDED.parent_id
                "#,
            )
            .bind(child_kind.as_str())
            .bind(&child.id)
            .bind(parent.kind.as_str())
            .bind(&parent.id)
            .bind(&child.info)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        debug!(parent = %parent, kind = %child_kind, count = children.len(), "Children upserted");
        Ok(())
    }

    async fn delete_stale_children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
        keep_ids: &[String],
    ) -> std::result::Result<u64, StoreError> {
        let result = sqlx_core::query::query(
            r#"
            WITH RECURSIVE doomed(kind, id) AS (
                SELECT kind, id
                FROM reconcile_entities
                WHERE parent_kind = $1 AND parent_id = $2 AND kind = $3
                  AND NOT (id = ANY($4))
              UNION
                SELECT c.kind, c.id
                FROM reconcile_entities c
                JOIN doomed d ON c.parent_kind = d.kind AND c.parent_id = d.id
            )
            DELETE FROM reconcile_entities e
            USING doomed d
            WHERE e.kind = d.kind AND e.id = d.id
            "#,
        )
        .bind(parent.kind.as_str())
        .bind(&parent.id)
        .bind(child_kind.as_str())
        .bind(keep_ids)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_cascade(&self, entity: &EntityRef) -> std::result::Result<u64, StoreError> {
        let result = sqlx_core::query::query(
            r#"
            WITH RECURSIVE doomed(kind, id) AS (
                SELECT kind, id
                FROM reconcile_entities
                WHERE kind = $1 AND id = $2
              UNION
                SELECT c.kind, c.id
                FROM reconcile_entities c
                JOIN doomed d ON c.parent_kind = d.kind AND c.parent_id = d.id
            )
            DELETE FROM reconcile_entities e
            USING doomed d
            WHERE e.kind = d.kind AND e.id = d.id
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(&entity.id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_chrono_round_trip_keeps_subsecond_precision() {
        let t = datetime!(2024-03-01 12:30:45.123456 UTC);
        assert_eq!(PostgresStore::chrono_to_time(PostgresStore::time_to_chrono(t)), t);
    }

    #[test]
    fn test_cutoff_subtracts_window() {
        let now = datetime!(2024-01-01 0:01 UTC);
        assert_eq!(
            PostgresStore::cutoff(now, Duration::from_secs(60)),
            datetime!(2024-01-01 0:00 UTC)
        );
    }

    #[test]
    fn test_cutoff_saturates_for_huge_windows() {
        let now = datetime!(2024-01-01 0:00 UTC);
        assert_eq!(
            PostgresStore::cutoff(now, Duration::MAX),
            OffsetDateTime::UNIX_EPOCH
        );
    }

    #[test]
    fn test_row_to_entity_maps_parent_link() {
        let entity = PostgresStore::row_to_entity((
            "space".into(),
            "s1".into(),
            Some("org".into()),
            Some("o1".into()),
            serde_json::json!({ "guid": "s1" }),
            None,
        ));
        assert_eq!(
            entity.parent,
            Some(EntityRef::new(EntityKind::from_static("org"), "o1"))
        );
        assert!(entity.last_reconciled.is_none());
    }
}
