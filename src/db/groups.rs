//! Link group repository.

use super::models::{GroupId, GroupRow, LinkGroup, UserId};
use super::{Clock, DbError};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Repository for link group operations.
pub struct GroupRepository<'a> {
    pool: &'a SqlitePool,
    clock: &'a Clock,
}

impl<'a> GroupRepository<'a> {
    /// Create a new group repository.
    pub fn new(pool: &'a SqlitePool, clock: &'a Clock) -> Self {
        Self { pool, clock }
    }

    /// Create an (initially empty) group. Callers must fill it before returning.
    pub async fn create(&self, owner: UserId, title: Option<&str>) -> Result<LinkGroup, DbError> {
        let now = self.clock.tick();
        let result =
            sqlx::query("INSERT INTO link_groups (user_id, title, created_at) VALUES (?, ?, ?)")
                .bind(owner)
                .bind(title)
                .bind(now)
                .execute(self.pool)
                .await?;

        Ok(LinkGroup {
            id: result.last_insert_rowid(),
            owner_id: owner,
            title: title.map(String::from),
            created_at: now,
        })
    }

    /// The owner's most recently created group.
    pub async fn latest(&self, owner: UserId) -> Result<Option<LinkGroup>, DbError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, user_id, title, created_at FROM link_groups
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(LinkGroup::from))
    }

    /// Find one owned group.
    pub async fn find(&self, owner: UserId, id: GroupId) -> Result<Option<LinkGroup>, DbError> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, user_id, title, created_at FROM link_groups WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(LinkGroup::from))
    }

    /// All groups of an owner.
    pub async fn list(&self, owner: UserId) -> Result<Vec<LinkGroup>, DbError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, user_id, title, created_at FROM link_groups WHERE user_id = ?",
        )
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(LinkGroup::from).collect())
    }

    /// Set or clear a group title. Returns `false` if no owned group matched.
    pub async fn rename(
        &self,
        owner: UserId,
        id: GroupId,
        title: Option<&str>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE link_groups SET title = ? WHERE id = ? AND user_id = ?")
            .bind(title)
            .bind(id)
            .bind(owner)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a group if (and only if) no link references it.
    ///
    /// The emptiness test and the delete are one statement, so a link moved in
    /// concurrently keeps its group.
    pub async fn delete_if_empty(&self, owner: UserId, id: GroupId) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM link_groups
            WHERE id = ? AND user_id = ?
              AND NOT EXISTS (SELECT 1 FROM links WHERE link_group_id = ?)
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete owned groups unconditionally. Returns the number removed.
    pub async fn delete_many(&self, owner: UserId, ids: &[GroupId]) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM link_groups WHERE user_id = ");
        query.push_bind(owner).push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        query.push(")");

        let result = query.build().execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}
