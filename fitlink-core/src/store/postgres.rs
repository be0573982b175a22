//! PostgreSQL link store
//!
//! - `PgExerciseLookup` reads `exercises.is_active` and `exercises.exercise_types`
//! - `PgLinkRepository` reads and writes `exercise_links`
//!
//! `commit` runs each `LinkWriteBatch` in one transaction. Every source
//! exercise touched by an insert or guard takes `pg_advisory_xact_lock`
//! first, so concurrent creates for one source queue behind each other and
//! the capacity guards see each other's rows. The partial unique index on
//! `(source, target, link_type) WHERE is_active` backs up the duplicate check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::gateway::{
    DuplicatePolicy, ExerciseLookup, LinkRepository, LinkUsage, LinkWriteBatch, RepositoryError,
};
use crate::ids::{ExerciseId, ExerciseLinkId};
use crate::models::{ExerciseLink, ExerciseLinkType, ExerciseSnapshot, ExerciseTypeTag};

const LINK_COLUMNS: &str = "id, source_exercise_id, target_exercise_id, link_type, \
                            display_order, is_active, created_at, updated_at";

/// Sorts link types in declaration order rather than alphabetically.
const LINK_TYPE_RANK: &str = "CASE link_type WHEN 'WARMUP' THEN 0 WHEN 'COOLDOWN' THEN 1 \
                              WHEN 'WORKOUT' THEN 2 ELSE 3 END";

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    source_exercise_id: Uuid,
    target_exercise_id: Uuid,
    link_type: String,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LinkRow> for ExerciseLink {
    type Error = RepositoryError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let link_type = ExerciseLinkType::parse(&row.link_type).ok_or_else(|| {
            RepositoryError::InvalidData(format!(
                "unknown link type {:?} on link {}",
                row.link_type, row.id
            ))
        })?;
        Ok(ExerciseLink {
            id: ExerciseLinkId::from_uuid(row.id),
            source_exercise_id: ExerciseId::from_uuid(row.source_exercise_id),
            target_exercise_id: ExerciseId::from_uuid(row.target_exercise_id),
            link_type,
            display_order: u32::try_from(row.display_order).unwrap_or(0),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    #[sqlx(flatten)]
    link: LinkRow,
    usage_count: i64,
}

fn into_links(rows: Vec<LinkRow>) -> Result<Vec<ExerciseLink>, RepositoryError> {
    rows.into_iter().map(ExerciseLink::try_from).collect()
}

/// `display_order` is an INTEGER column.
fn display_order_param(order: u32) -> Result<i32, RepositoryError> {
    i32::try_from(order).map_err(|_| {
        RepositoryError::InvalidData(format!("display order {} exceeds INTEGER range", order))
    })
}

/// Advisory lock key for a source exercise: the high half of its uuid.
fn lock_key(id: ExerciseId) -> i64 {
    id.as_uuid().as_u64_pair().0 as i64
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return RepositoryError::Conflict(db.message().to_string());
        }
    }
    RepositoryError::Database(err)
}

// ============================================================================
// Exercise lookup
// ============================================================================

#[derive(Clone)]
pub struct PgExerciseLookup {
    pool: PgPool,
}

impl PgExerciseLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExerciseLookup for PgExerciseLookup {
    async fn get_by_id(&self, id: ExerciseId) -> Result<Option<ExerciseSnapshot>, RepositoryError> {
        let row: Option<(bool, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT is_active, exercise_types
            FROM exercises
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(is_active, raw_tags)| {
            let mut tags = BTreeSet::new();
            for raw in &raw_tags {
                match ExerciseTypeTag::parse(raw) {
                    Some(tag) => {
                        tags.insert(tag);
                    }
                    None => {
                        tracing::warn!(exercise_id = %id, tag = %raw, "Ignoring unknown exercise type tag");
                    }
                }
            }
            ExerciseSnapshot { id, is_active, tags }
        }))
    }
}

// ============================================================================
// Link repository
// ============================================================================

#[derive(Clone)]
pub struct PgLinkRepository {
    pool: PgPool,
}

impl PgLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_sources(
        tx: &mut Transaction<'_, Postgres>,
        batch: &LinkWriteBatch,
    ) -> Result<(), RepositoryError> {
        let mut keys: BTreeSet<i64> = batch
            .inserts
            .iter()
            .map(|i| lock_key(i.link.source_exercise_id))
            .collect();
        keys.extend(batch.guards.iter().map(|g| lock_key(g.source)));

        // Ascending order keeps two batches from deadlocking on each other.
        for key in keys {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(key)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn active_edge_exists(
        tx: &mut Transaction<'_, Postgres>,
        link: &ExerciseLink,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM exercise_links
                WHERE source_exercise_id = $1
                  AND target_exercise_id = $2
                  AND link_type = $3
                  AND is_active
            )
            "#,
        )
        .bind(link.source_exercise_id.as_uuid())
        .bind(link.target_exercise_id.as_uuid())
        .bind(link.link_type.as_str())
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn get_by_id(&self, id: ExerciseLinkId) -> Result<Option<ExerciseLink>, RepositoryError> {
        let sql = format!("SELECT {} FROM exercise_links WHERE id = $1", LINK_COLUMNS);
        let row: Option<LinkRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExerciseLink::try_from).transpose()
    }

    async fn get_outbound_edges(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM exercise_links \
             WHERE source_exercise_id = $1 AND is_active \
             ORDER BY {}, display_order, created_at",
            LINK_COLUMNS, LINK_TYPE_RANK
        );
        let rows: Vec<LinkRow> = sqlx::query_as(&sql)
            .bind(exercise_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        into_links(rows)
    }

    async fn get_inbound_edges(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ExerciseLink>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM exercise_links \
             WHERE target_exercise_id = $1 AND is_active \
             ORDER BY {}, display_order, created_at",
            LINK_COLUMNS, LINK_TYPE_RANK
        );
        let rows: Vec<LinkRow> = sqlx::query_as(&sql)
            .bind(exercise_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        into_links(rows)
    }

    async fn exists_edge(
        &self,
        source: ExerciseId,
        target: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM exercise_links
                WHERE source_exercise_id = $1
                  AND target_exercise_id = $2
                  AND link_type = $3
                  AND is_active
            )
            "#,
        )
        .bind(source.as_uuid())
        .bind(target.as_uuid())
        .bind(link_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_outbound_edges(
        &self,
        source: ExerciseId,
        link_type: ExerciseLinkType,
    ) -> Result<u32, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM exercise_links
            WHERE source_exercise_id = $1 AND link_type = $2 AND is_active
            "#,
        )
        .bind(source.as_uuid())
        .bind(link_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn most_used_links(&self, count: u32) -> Result<Vec<LinkUsage>, RepositoryError> {
        // One representative (oldest) row per (target, type) group.
        let sql = format!(
            r#"
            SELECT {cols}, usage_count
            FROM (
                SELECT l.*,
                       COUNT(*) OVER (PARTITION BY target_exercise_id, link_type) AS usage_count,
                       ROW_NUMBER() OVER (
                           PARTITION BY target_exercise_id, link_type
                           ORDER BY created_at
                       ) AS rn
                FROM exercise_links l
                WHERE is_active
            ) ranked
            WHERE rn = 1
            ORDER BY usage_count DESC, created_at
            LIMIT $1
            "#,
            cols = LINK_COLUMNS
        );
        let rows: Vec<UsageRow> = sqlx::query_as(&sql)
            .bind(i64::from(count))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(LinkUsage {
                    usage_count: u32::try_from(row.usage_count).unwrap_or(u32::MAX),
                    link: ExerciseLink::try_from(row.link)?,
                })
            })
            .collect()
    }

    async fn commit(&self, batch: LinkWriteBatch) -> Result<Vec<ExerciseLink>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_sources(&mut tx, &batch).await?;

        for id in &batch.deactivations {
            let result = sqlx::query(
                r#"
                UPDATE exercise_links
                SET is_active = FALSE, updated_at = NOW()
                WHERE id = $1 AND is_active
                "#,
            )
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(*id));
            }
        }

        for link in &batch.updates {
            let result = sqlx::query(
                r#"
                UPDATE exercise_links
                SET display_order = $2, is_active = $3, updated_at = $4
                WHERE id = $1 AND is_active
                "#,
            )
            .bind(link.id.as_uuid())
            .bind(display_order_param(link.display_order)?)
            .bind(link.is_active)
            .bind(link.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(link.id));
            }
        }

        let mut inserted = Vec::with_capacity(batch.inserts.len());
        for insert in batch.inserts {
            let link = insert.link;
            if Self::active_edge_exists(&mut tx, &link).await? {
                match insert.on_duplicate {
                    DuplicatePolicy::Skip => {
                        tracing::debug!(
                            source = %link.source_exercise_id,
                            target = %link.target_exercise_id,
                            link_type = %link.link_type,
                            "Edge already present, skipping insert"
                        );
                        continue;
                    }
                    DuplicatePolicy::Reject => {
                        return Err(RepositoryError::Conflict(format!(
                            "{} link from {} to {} already exists",
                            link.link_type, link.source_exercise_id, link.target_exercise_id
                        )));
                    }
                }
            }

            sqlx::query(
                r#"
                INSERT INTO exercise_links
                    (id, source_exercise_id, target_exercise_id, link_type,
                     display_order, is_active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(link.id.as_uuid())
            .bind(link.source_exercise_id.as_uuid())
            .bind(link.target_exercise_id.as_uuid())
            .bind(link.link_type.as_str())
            .bind(display_order_param(link.display_order)?)
            .bind(link.is_active)
            .bind(link.created_at)
            .bind(link.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

            inserted.push(link);
        }

        for guard in &batch.guards {
            let (count,): (i64,) = sqlx::query_as(
                r#"
                SELECT COUNT(*)
                FROM exercise_links
                WHERE source_exercise_id = $1 AND link_type = $2 AND is_active
                "#,
            )
            .bind(guard.source.as_uuid())
            .bind(guard.link_type.as_str())
            .fetch_one(&mut *tx)
            .await?;

            if count > i64::from(guard.max) {
                // Dropping `tx` rolls everything back.
                return Err(RepositoryError::Conflict(format!(
                    "{} already has the maximum of {} {} links",
                    guard.source, guard.max, guard.link_type
                )));
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
