use crate::model::chat::ChatMessage;
use crate::model::peer::PeerIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description as exchanged by browsers: `{"type": "...", "sdp": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    #[serde(default)]
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }

    /// Local description that discards a pending local offer.
    pub fn rollback() -> Self {
        Self {
            kind: SdpKind::Rollback,
            sdp: String::new(),
        }
    }
}

/// ICE candidate in `RTCIceCandidateInit` JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Signal {
    Announce,
    Offer {
        sdp: SessionDescription,
    },
    Answer {
        sdp: SessionDescription,
    },
    IceCandidate {
        candidate: IceCandidate,
    },
    Leave,
    Chat {
        #[serde(rename = "chatMessage")]
        chat_message: ChatMessage,
    },
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Announce => SignalKind::Announce,
            Signal::Offer { .. } => SignalKind::Offer,
            Signal::Answer { .. } => SignalKind::Answer,
            Signal::IceCandidate { .. } => SignalKind::IceCandidate,
            Signal::Leave => SignalKind::Leave,
            Signal::Chat { .. } => SignalKind::Chat,
        }
    }
}

/// Payload-free discriminant of [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Announce,
    Offer,
    Answer,
    IceCandidate,
    Leave,
    Chat,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Announce => "announce",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::Leave => "leave",
            Self::Chat => "chat",
        };
        f.write_str(s)
    }
}

/// Everything that travels over the relay.
///
/// Wire shape: `{"type": "offer", "senderId": "...", "sdp": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub sender_id: PeerIdentity,
    #[serde(flatten)]
    pub signal: Signal,
}

impl SignalEnvelope {
    pub fn new(sender_id: PeerIdentity, signal: Signal) -> Self {
        Self { sender_id, signal }
    }

    pub fn announce(sender_id: PeerIdentity) -> Self {
        Self::new(sender_id, Signal::Announce)
    }

    pub fn leave(sender_id: PeerIdentity) -> Self {
        Self::new(sender_id, Signal::Leave)
    }

    pub fn kind(&self) -> SignalKind {
        self.signal.kind()
    }
}
