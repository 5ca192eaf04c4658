//! Socket protocol: symmetric JSON text frames.
//!
//! Inbound frames are `{authToken, method, payload?, requestId?}` and decode
//! into the closed [`Request`] set; outbound frames are `{event, payload?}`
//! built from [`Event`].

mod inbound;
mod outbound;

pub use inbound::{
    ChangeLinkGroup, CreateGroupWithLinks, Envelope, MergeGroups, MoveLinks,
    RenameLinkGroup, Request,
};
pub use outbound::{Event, GroupedLinks, LinkSnapshot, RetryRequest};
