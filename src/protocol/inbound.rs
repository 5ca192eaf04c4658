//! Inbound message decoding.

use crate::db::{GroupId, LinkId, NewLink};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Raw inbound frame, before the method is resolved.
///
/// `authToken` and `method` are kept as raw values: a frame with a numeric
/// token is still well formed, it just fails authentication.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub auth_token: Option<Value>,
    pub method: Option<Value>,
    pub payload: Option<Value>,
    /// Correlation id chosen by the client; echoed back verbatim.
    pub request_id: Option<Value>,
}

impl Envelope {
    /// Parse a text frame. Anything but a JSON object is malformed.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The method name, if one was sent as a string.
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_ref().and_then(Value::as_str)
    }
}

/// Errors decoding the payload of a known method.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0} requires a payload")]
    MissingPayload(&'static str),
    #[error("invalid {method} payload: {source}")]
    Payload {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} payload has an empty title or link")]
    InvalidLink(&'static str),
}

/// `change-link-group` payload. A stale `oldLinkGroupId` from older clients is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLinkGroup {
    pub link_id: LinkId,
    pub new_link_group_id: GroupId,
}

/// `rename-link-group` payload; echoed back in `link-group-updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameLinkGroup {
    pub link_group_id: GroupId,
    pub link_group_name: Option<String>,
}

/// `create-group-with-links` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupWithLinks {
    pub link_ids: Vec<LinkId>,
    #[serde(default)]
    pub title: Option<String>,
}

/// `merge-groups` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeGroups {
    pub target_group_id: GroupId,
    pub source_group_ids: Vec<GroupId>,
}

/// `move-links` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLinks {
    pub target_group_id: GroupId,
    pub link_ids: Vec<LinkId>,
}

/// Every method the server understands, with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetLinks,
    AddLink(NewLink),
    AddLinks(Vec<NewLink>),
    DeleteLink(LinkId),
    ChangeLinkGroup(ChangeLinkGroup),
    RenameLinkGroup(RenameLinkGroup),
    CreateGroupWithLinks(CreateGroupWithLinks),
    MergeGroups(MergeGroups),
    MoveLinks(MoveLinks),
}

const GET_LINKS: &str = "get-links";
const ADD_LINK: &str = "add-link";
const ADD_LINKS: &str = "add-links";
const DELETE_LINK: &str = "delete-link";
const CHANGE_LINK_GROUP: &str = "change-link-group";
const RENAME_LINK_GROUP: &str = "rename-link-group";
const CREATE_GROUP_WITH_LINKS: &str = "create-group-with-links";
const MERGE_GROUPS: &str = "merge-groups";
const MOVE_LINKS: &str = "move-links";

impl Request {
    /// Resolve a method name and payload.
    ///
    /// Unknown methods decode to `Ok(None)` so newer clients can talk to older servers.
    pub fn decode(method: &str, payload: Option<Value>) -> Result<Option<Self>, DecodeError> {
        let request = match method {
            GET_LINKS => Self::GetLinks,
            ADD_LINK => {
                let link: NewLink = from_payload(ADD_LINK, payload)?;
                if !link.is_well_formed() {
                    return Err(DecodeError::InvalidLink(ADD_LINK));
                }
                Self::AddLink(link)
            }
            ADD_LINKS => {
                let links: Vec<NewLink> = from_payload(ADD_LINKS, payload)?;
                if !links.iter().all(NewLink::is_well_formed) {
                    return Err(DecodeError::InvalidLink(ADD_LINKS));
                }
                Self::AddLinks(links)
            }
            DELETE_LINK => Self::DeleteLink(from_payload(DELETE_LINK, payload)?),
            CHANGE_LINK_GROUP => Self::ChangeLinkGroup(from_payload(CHANGE_LINK_GROUP, payload)?),
            RENAME_LINK_GROUP => Self::RenameLinkGroup(from_payload(RENAME_LINK_GROUP, payload)?),
            CREATE_GROUP_WITH_LINKS => {
                Self::CreateGroupWithLinks(from_payload(CREATE_GROUP_WITH_LINKS, payload)?)
            }
            MERGE_GROUPS => Self::MergeGroups(from_payload(MERGE_GROUPS, payload)?),
            MOVE_LINKS => Self::MoveLinks(from_payload(MOVE_LINKS, payload)?),
            _ => return Ok(None),
        };
        Ok(Some(request))
    }

    /// Wire name of the method.
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetLinks => GET_LINKS,
            Self::AddLink(_) => ADD_LINK,
            Self::AddLinks(_) => ADD_LINKS,
            Self::DeleteLink(_) => DELETE_LINK,
            Self::ChangeLinkGroup(_) => CHANGE_LINK_GROUP,
            Self::RenameLinkGroup(_) => RENAME_LINK_GROUP,
            Self::CreateGroupWithLinks(_) => CREATE_GROUP_WITH_LINKS,
            Self::MergeGroups(_) => MERGE_GROUPS,
            Self::MoveLinks(_) => MOVE_LINKS,
        }
    }
}

fn from_payload<T: DeserializeOwned>(
    method: &'static str,
    payload: Option<Value>,
) -> Result<T, DecodeError> {
    let payload = payload.ok_or(DecodeError::MissingPayload(method))?;
    serde_json::from_value(payload).map_err(|source| DecodeError::Payload { method, source })
}
