//! Mutation engine.
//!
//! Every state-changing operation on links and groups, each scoped to the
//! owner taken from the authenticated identity. An operation verifies that
//! every id it touches belongs to that owner before it writes anything;
//! foreign ids are reported as [`EngineError::NotFound`], exactly like ids
//! that never existed.
//!
//! After a successful write the engine fans an event out to the owner's
//! live connections through the [`Notifier`], then applies group
//! housekeeping: a group left without links is deleted.
//!
//! Multi-step operations are not wrapped in transactions. Two operations of
//! the same owner may interleave between their storage calls; the worst
//! outcome is a duplicate or lingering empty group, never a lost link.

mod read;

pub use crate::error::{EngineError, EngineResult};

use crate::db::{Database, GroupId, Link, LinkGroup, LinkId, NewLink, UserId};
use crate::protocol::{
    ChangeLinkGroup, CreateGroupWithLinks, Event, MergeGroups, MoveLinks, RenameLinkGroup,
};
use crate::state::Notifier;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The link was removed and every live connection was told.
    Deleted,
    /// Nothing owned matched; only the requester needs to know.
    AlreadyDeleted,
}

/// Applies mutations and announces them.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    db: Database,
    notifier: Notifier,
    reuse_window: Duration,
}

impl MutationEngine {
    /// `reuse_window` is how old the newest group may be for add-link to keep using it.
    pub fn new(db: Database, notifier: Notifier, reuse_window: Duration) -> Self {
        Self {
            db,
            notifier,
            reuse_window,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Add one link to the owner's current group.
    ///
    /// The current group is the most recently created one if it is younger
    /// than the reuse window; otherwise (or when the owner has none) a new
    /// group is created first.
    #[instrument(skip(self, link, request_id), fields(user_id = owner))]
    pub async fn add_link(
        &self,
        owner: UserId,
        link: &NewLink,
        request_id: Option<Value>,
    ) -> EngineResult<Link> {
        let groups = self.db.groups();
        let cutoff = Utc::now()
            .timestamp_micros()
            .saturating_sub(self.reuse_window.num_microseconds().unwrap_or(i64::MAX));

        let group = match groups.latest(owner).await? {
            Some(group) if group.created_at >= cutoff => group,
            _ => {
                let group = groups.create(owner, None).await?;
                debug!(group_id = group.id, "Opened new link group");
                group
            }
        };

        let link = self.db.links().insert(owner, group.id, link).await?;
        self.notifier.notify(owner, Event::LinkAdded { request_id });
        Ok(link)
    }

    /// Import a batch of links into a fresh group of their own.
    #[instrument(skip(self, links, request_id), fields(user_id = owner, count = links.len()))]
    pub async fn add_links(
        &self,
        owner: UserId,
        links: &[NewLink],
        request_id: Option<Value>,
    ) -> EngineResult<LinkGroup> {
        if links.is_empty() {
            return Err(EngineError::EmptySelection);
        }

        let group = self.db.groups().create(owner, None).await?;
        let repo = self.db.links();
        for link in links {
            repo.insert(owner, group.id, link).await?;
        }

        self.notifier.notify(owner, Event::LinksAdded { request_id });
        Ok(group)
    }

    /// Delete a link. Deleting a missing or foreign link is not an error.
    #[instrument(skip(self), fields(user_id = owner))]
    pub async fn delete_link(&self, owner: UserId, link_id: LinkId) -> EngineResult<DeleteOutcome> {
        let Some(group_id) = self.db.links().delete(owner, link_id).await? else {
            return Ok(DeleteOutcome::AlreadyDeleted);
        };

        self.notifier.notify(owner, Event::LinkDeleted(link_id));
        self.sweep_group(owner, group_id).await?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Move one link into another owned group.
    #[instrument(skip(self), fields(user_id = owner))]
    pub async fn change_group(&self, owner: UserId, change: ChangeLinkGroup) -> EngineResult<()> {
        let target = change.new_link_group_id;
        self.require_group(owner, target).await?;

        let links = self.db.links();
        let link = links
            .find(owner, change.link_id)
            .await?
            .ok_or(EngineError::NotFound("link"))?;

        if !links.move_to_group(owner, link.id, target).await? {
            return Err(EngineError::NotFound("link"));
        }

        self.notifier.notify(owner, Event::LinkUpdated(link.id));
        if link.group_id != target {
            self.sweep_group(owner, link.group_id).await?;
        }
        Ok(())
    }

    /// Set or clear a group title.
    #[instrument(skip(self), fields(user_id = owner))]
    pub async fn rename_group(&self, owner: UserId, rename: RenameLinkGroup) -> EngineResult<()> {
        let renamed = self
            .db
            .groups()
            .rename(owner, rename.link_group_id, rename.link_group_name.as_deref())
            .await?;
        if !renamed {
            return Err(EngineError::NotFound("link group"));
        }

        self.notifier.notify(owner, Event::LinkGroupUpdated(rename));
        Ok(())
    }

    /// Gather a selection of links into a new group, keeping the given order.
    ///
    /// The groups the links came from are not swept, even if they end up empty.
    #[instrument(skip(self, create), fields(user_id = owner, count = create.link_ids.len()))]
    pub async fn create_group_from_selection(
        &self,
        owner: UserId,
        create: CreateGroupWithLinks,
    ) -> EngineResult<LinkGroup> {
        let link_ids = dedup(&create.link_ids);
        if link_ids.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        self.require_links(owner, &link_ids).await?;

        let group = self
            .db
            .groups()
            .create(owner, create.title.as_deref())
            .await?;
        self.reparent(owner, group.id, link_ids.iter().copied()).await?;

        self.notifier.notify(
            owner,
            Event::LinkGroupCreated {
                link_group_id: group.id,
                link_ids,
            },
        );
        Ok(group)
    }

    /// Fold source groups into a target group and delete the sources.
    #[instrument(skip(self, merge), fields(user_id = owner, group_id = merge.target_group_id))]
    pub async fn merge_groups(&self, owner: UserId, merge: MergeGroups) -> EngineResult<()> {
        let target = merge.target_group_id;
        let sources: Vec<GroupId> = dedup(&merge.source_group_ids)
            .into_iter()
            .filter(|id| *id != target)
            .collect();
        if sources.is_empty() {
            return Err(EngineError::EmptySelection);
        }

        self.require_group(owner, target).await?;
        for source in &sources {
            self.require_group(owner, *source).await?;
        }

        let moving = self.db.links().list_in_groups(owner, &sources).await?;
        self.reparent(owner, target, moving.iter().map(|link| link.id))
            .await?;

        let removed = self.db.groups().delete_many(owner, &sources).await?;
        debug!(removed, "Deleted merged groups");

        self.notifier.notify(
            owner,
            Event::LinkGroupsMerged(MergeGroups {
                target_group_id: target,
                source_group_ids: sources,
            }),
        );
        Ok(())
    }

    /// Move a selection of links into an existing group, keeping the given order.
    ///
    /// Like [`Self::create_group_from_selection`], emptied groups are left in place.
    #[instrument(skip(self, moved), fields(user_id = owner, group_id = moved.target_group_id))]
    pub async fn move_matching_links(&self, owner: UserId, moved: MoveLinks) -> EngineResult<()> {
        let link_ids = dedup(&moved.link_ids);
        if link_ids.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        let target = moved.target_group_id;
        self.require_group(owner, target).await?;
        self.require_links(owner, &link_ids).await?;

        self.reparent(owner, target, link_ids.iter().copied()).await?;

        self.notifier.notify(
            owner,
            Event::LinksMoved(MoveLinks {
                target_group_id: target,
                link_ids,
            }),
        );
        Ok(())
    }

    /// Write links into `group_id` last-to-first.
    ///
    /// Listing is newest-write-first, so the first id of `ordered` must be
    /// written last to be read back first.
    async fn reparent<I>(&self, owner: UserId, group_id: GroupId, ordered: I) -> EngineResult<()>
    where
        I: DoubleEndedIterator<Item = LinkId>,
    {
        let links = self.db.links();
        for link_id in ordered.rev() {
            links.move_to_group(owner, link_id, group_id).await?;
        }
        Ok(())
    }

    /// Delete a group if it no longer holds any link.
    async fn sweep_group(&self, owner: UserId, group_id: GroupId) -> EngineResult<()> {
        if self.db.groups().delete_if_empty(owner, group_id).await? {
            debug!(group_id, "Deleted empty link group");
        }
        Ok(())
    }

    async fn require_group(&self, owner: UserId, group_id: GroupId) -> EngineResult<LinkGroup> {
        self.db
            .groups()
            .find(owner, group_id)
            .await?
            .ok_or(EngineError::NotFound("link group"))
    }

    async fn require_links(&self, owner: UserId, link_ids: &[LinkId]) -> EngineResult<()> {
        let owned = self.db.links().owned_ids(owner, link_ids).await?;
        if link_ids.iter().all(|id| owned.contains(id)) {
            Ok(())
        } else {
            Err(EngineError::NotFound("link"))
        }
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
