use thiserror::Error;

use crate::quantities::{NodeId, Time};

/// Everything that can go wrong inside a run.
///
/// Only [`SimError::CausalityViolation`] is fatal to the event loop;
/// every other variant is reported at the site that detects it and the
/// offending operation becomes a no-op.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("no registered {family} kind `{name}`")]
    UnknownKind { family: &'static str, name: String },

    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),

    #[error("duplicate link {0} -> {1}")]
    DuplicateLink(NodeId, NodeId),

    #[error("the broadcast id is reserved and cannot name a node or link endpoint")]
    ReservedId,

    #[error("no such node {0}")]
    NoSuchNode(NodeId),

    #[error("no link {0} -> {1}")]
    NoSuchLink(NodeId, NodeId),

    #[error("cannot link node {0} to itself")]
    SelfLink(NodeId),

    #[error("malformed control update `{0}`")]
    MalformedControl(String),

    #[error("event scheduled at {scheduled}, behind the clock at {clock}")]
    CausalityViolation { scheduled: Time, clock: Time },
}
