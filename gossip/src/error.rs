use thiserror::Error;

use crate::peers::PeerId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GossipError {
    #[error("peer {0} is unavailable")]
    PeerUnavailable(PeerId),

    #[error("peer {peer} has no {what}")]
    NotFound { peer: PeerId, what: String },
}
