//! Link repository.

use super::models::{GroupId, Link, LinkId, LinkRow, NewLink, UserId};
use super::{Clock, DbError};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;

const LINK_COLUMNS: &str = "id, title, link, link_group_id, user_id, updated_at";

/// Repository for link operations.
pub struct LinkRepository<'a> {
    pool: &'a SqlitePool,
    clock: &'a Clock,
}

impl<'a> LinkRepository<'a> {
    /// Create a new link repository.
    pub fn new(pool: &'a SqlitePool, clock: &'a Clock) -> Self {
        Self { pool, clock }
    }

    /// Insert a link into a group.
    pub async fn insert(
        &self,
        owner: UserId,
        group_id: GroupId,
        link: &NewLink,
    ) -> Result<Link, DbError> {
        let now = self.clock.tick();
        let result = sqlx::query(
            r#"
            INSERT INTO links (title, link, link_group_id, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.title)
        .bind(&link.link)
        .bind(group_id)
        .bind(owner)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(Link {
            id: result.last_insert_rowid(),
            title: link.title.clone(),
            url: link.link.clone(),
            group_id,
            owner_id: owner,
            updated_at: now,
        })
    }

    /// All links of an owner, most recently updated first.
    pub async fn list(&self, owner: UserId) -> Result<Vec<Link>, DbError> {
        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE user_id = ? ORDER BY updated_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Link::from).collect())
    }

    /// Links of an owner inside any of the given groups, most recently updated first.
    pub async fn list_in_groups(
        &self,
        owner: UserId,
        group_ids: &[GroupId],
    ) -> Result<Vec<Link>, DbError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE user_id = "
        ));
        query.push_bind(owner).push(" AND link_group_id IN (");
        let mut ids = query.separated(", ");
        for id in group_ids {
            ids.push_bind(*id);
        }
        query.push(") ORDER BY updated_at DESC, id DESC");

        let rows = query
            .build_query_as::<LinkRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    /// Find one owned link.
    pub async fn find(&self, owner: UserId, id: LinkId) -> Result<Option<Link>, DbError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Link::from))
    }

    /// Which of `ids` the owner actually owns.
    pub async fn owned_ids(
        &self,
        owner: UserId,
        ids: &[LinkId],
    ) -> Result<HashSet<LinkId>, DbError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id FROM links WHERE user_id = ");
        query.push_bind(owner).push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        query.push(")");

        let rows: Vec<(i64,)> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete an owned link, returning the group it belonged to.
    ///
    /// `None` means no owned row matched (already deleted, or never ours).
    pub async fn delete(&self, owner: UserId, id: LinkId) -> Result<Option<GroupId>, DbError> {
        let group_id = sqlx::query_scalar::<_, i64>(
            "DELETE FROM links WHERE id = ? AND user_id = ? RETURNING link_group_id",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;

        Ok(group_id)
    }

    /// Re-parent an owned link and stamp it as the most recent write.
    ///
    /// Returns `false` if no owned row matched.
    pub async fn move_to_group(
        &self,
        owner: UserId,
        id: LinkId,
        group_id: GroupId,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE links SET link_group_id = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(self.clock.tick())
        .bind(id)
        .bind(owner)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
