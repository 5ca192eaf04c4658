//! Link, group and account models.

use serde::Serialize;

/// Account identifier.
pub type UserId = i64;
/// Link identifier.
pub type LinkId = i64;
/// Link group identifier.
pub type GroupId = i64;

/// A stored link.
///
/// Serialized for the socket protocol with camelCase keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: LinkId,
    pub title: String,
    pub url: String,
    pub group_id: GroupId,
    pub owner_id: UserId,
    pub updated_at: i64,
}

/// Row shape: id, title, link, link_group_id, user_id, updated_at.
pub(super) type LinkRow = (i64, String, String, i64, i64, i64);

impl From<LinkRow> for Link {
    fn from((id, title, url, group_id, owner_id, updated_at): LinkRow) -> Self {
        Self {
            id,
            title,
            url,
            group_id,
            owner_id,
            updated_at,
        }
    }
}

/// A link group. Pure container; never persists without members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkGroup {
    pub id: GroupId,
    pub owner_id: UserId,
    pub title: Option<String>,
    pub created_at: i64,
}

/// Row shape: id, user_id, title, created_at.
pub(super) type GroupRow = (i64, i64, Option<String>, i64);

impl From<GroupRow> for LinkGroup {
    fn from((id, owner_id, title, created_at): GroupRow) -> Self {
        Self {
            id,
            owner_id,
            title,
            created_at,
        }
    }
}

/// Title and URL of a link about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct NewLink {
    pub title: String,
    #[serde(alias = "url")]
    pub link: String,
}

impl NewLink {
    /// Both title and link are non-blank.
    pub fn is_well_formed(&self) -> bool {
        !self.title.trim().is_empty() && !self.link.trim().is_empty()
    }
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

/// An API key for the ingestion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    pub id: i64,
    pub api_key: String,
    pub user_id: UserId,
    pub created_at: i64,
}
