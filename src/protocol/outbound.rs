//! Outbound events.

use super::inbound::{MergeGroups, MoveLinks, RenameLinkGroup};
use crate::db::{GroupId, Link, LinkGroup, LinkId};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// One group with its links, as listed by `receive-links`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedLinks {
    pub link_group: LinkGroup,
    pub links: Vec<Link>,
}

/// Full listing of an owner's links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSnapshot {
    /// Groups, most recently updated first; links inside likewise.
    pub link_groups: Vec<GroupedLinks>,
    pub link_count: usize,
}

/// The request a client should replay after renewing its token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Every event the server emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ReceiveLinks(LinkSnapshot),
    /// Authentication failed; carries the rejected request when there was one.
    NeedValidToken(Option<RetryRequest>),
    LinkAdded { request_id: Option<Value> },
    LinksAdded { request_id: Option<Value> },
    LinkDeleted(LinkId),
    LinkAlreadyDeleted(LinkId),
    LinkUpdated(LinkId),
    LinkGroupUpdated(RenameLinkGroup),
    LinkGroupCreated {
        link_group_id: GroupId,
        link_ids: Vec<LinkId>,
    },
    LinkGroupsMerged(MergeGroups),
    LinksMoved(MoveLinks),
}

impl Event {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReceiveLinks(_) => "receive-links",
            Self::NeedValidToken(_) => "need-valid-token",
            Self::LinkAdded { .. } => "link-added",
            Self::LinksAdded { .. } => "links-added",
            Self::LinkDeleted(_) => "link-deleted",
            Self::LinkAlreadyDeleted(_) => "link-already-deleted",
            Self::LinkUpdated(_) => "link-updated",
            Self::LinkGroupUpdated(_) => "link-group-updated",
            Self::LinkGroupCreated { .. } => "link-group-created",
            Self::LinkGroupsMerged(_) => "link-groups-merged",
            Self::LinksMoved(_) => "links-moved",
        }
    }

    /// Render as a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn has_payload(&self) -> bool {
        !matches!(
            self,
            Self::NeedValidToken(None)
                | Self::LinkAdded { request_id: None }
                | Self::LinksAdded { request_id: None }
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestEcho<'a> {
    request_id: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupCreated<'a> {
    link_group_id: GroupId,
    link_ids: &'a [LinkId],
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.has_payload() { 2 } else { 1 };
        let mut frame = serializer.serialize_struct("Event", fields)?;
        frame.serialize_field("event", self.name())?;

        match self {
            Self::ReceiveLinks(snapshot) => frame.serialize_field("payload", snapshot)?,
            Self::NeedValidToken(Some(retry)) => frame.serialize_field("payload", retry)?,
            Self::LinkAdded {
                request_id: Some(request_id),
            }
            | Self::LinksAdded {
                request_id: Some(request_id),
            } => frame.serialize_field("payload", &RequestEcho { request_id })?,
            Self::LinkDeleted(id) | Self::LinkAlreadyDeleted(id) | Self::LinkUpdated(id) => {
                frame.serialize_field("payload", id)?
            }
            Self::LinkGroupUpdated(rename) => frame.serialize_field("payload", rename)?,
            Self::LinkGroupCreated {
                link_group_id,
                link_ids,
            } => frame.serialize_field(
                "payload",
                &GroupCreated {
                    link_group_id: *link_group_id,
                    link_ids,
                },
            )?,
            Self::LinkGroupsMerged(merge) => frame.serialize_field("payload", merge)?,
            Self::LinksMoved(moved) => frame.serialize_field("payload", moved)?,
            Self::NeedValidToken(None)
            | Self::LinkAdded { request_id: None }
            | Self::LinksAdded { request_id: None } => {}
        }

        frame.end()
    }
}
