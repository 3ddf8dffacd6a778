use serde::Deserialize;
use tandem_core::IceServerConfig;

/// ICE configuration shared by every engine a session builds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}

impl TransportConfig {
    /// Host candidates only. Enough for two peers on the same machine.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}
