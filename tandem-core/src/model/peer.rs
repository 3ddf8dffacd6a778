use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Random token naming this process for the lifetime of one session.
///
/// Identities are compared lexicographically over their string form; the
/// comparison is the only thing that decides who sends the offer.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Negotiation role for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends the offer.
    Initiator,
    /// Waits for the offer and answers it.
    Follower,
}

impl Role {
    /// Elect the local role against a remote identity.
    ///
    /// Returns `None` for equal identities: there is no way to break the tie.
    pub fn elect(local: &PeerIdentity, remote: &PeerIdentity) -> Option<Role> {
        match local.cmp(remote) {
            Ordering::Greater => Some(Role::Initiator),
            Ordering::Less => Some(Role::Follower),
            Ordering::Equal => None,
        }
    }
}
