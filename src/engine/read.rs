//! Read side: the `receive-links` snapshot.

use super::{EngineResult, MutationEngine};
use crate::db::{GroupId, LinkGroup, UserId};
use crate::protocol::{GroupedLinks, LinkSnapshot};
use std::collections::HashMap;

impl MutationEngine {
    /// Every link of `owner`, grouped.
    ///
    /// Links are listed newest-write-first, and groups in the order their
    /// newest link appears, so the group touched last comes first. A link
    /// whose group row is missing still shows up, under an untitled group.
    pub async fn snapshot(&self, owner: UserId) -> EngineResult<LinkSnapshot> {
        let links = self.db.links().list(owner).await?;
        let mut groups: HashMap<GroupId, LinkGroup> = self
            .db
            .groups()
            .list(owner)
            .await?
            .into_iter()
            .map(|group| (group.id, group))
            .collect();

        let link_count = links.len();
        let mut position: HashMap<GroupId, usize> = HashMap::new();
        let mut link_groups: Vec<GroupedLinks> = Vec::new();

        for link in links {
            let index = *position.entry(link.group_id).or_insert_with(|| {
                let link_group = groups.remove(&link.group_id).unwrap_or(LinkGroup {
                    id: link.group_id,
                    owner_id: owner,
                    title: None,
                    created_at: 0,
                });
                link_groups.push(GroupedLinks {
                    link_group,
                    links: Vec::new(),
                });
                link_groups.len() - 1
            });
            link_groups[index].links.push(link);
        }

        Ok(LinkSnapshot {
            link_groups,
            link_count,
        })
    }
}
