use crate::console_observer::{ConsoleObserver, PeerUpdate};
use anyhow::{Context, Result, bail};
use colored::*;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ConnectionStatus, IceServerConfig, PeerIdentity, RoomId};
use tandem_session::{LocalRelay, RtcEngineFactory, Session, SessionConfig, TransportConfig};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    session: Option<SessionConfig>,
    transport: Option<TransportConfig>,
}

pub struct LoopbackOptions {
    session: SessionConfig,
    transport: TransportConfig,
    timeout: Duration,
    message: String,
}

impl LoopbackOptions {
    /// Merge the optional config file with command-line flags; flags win.
    pub fn load(
        room: String,
        ice_servers: Vec<String>,
        timeout_secs: u64,
        config: Option<&Path>,
        message: String,
    ) -> Result<Self> {
        let file = match config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str::<FileConfig>(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let mut session = file.session.unwrap_or_default();
        session.room = RoomId::from(room);

        let transport = if !ice_servers.is_empty() {
            TransportConfig {
                ice_servers: vec![IceServerConfig {
                    urls: ice_servers,
                    username: None,
                    credential: None,
                }],
            }
        } else {
            file.transport.unwrap_or_else(TransportConfig::local_only)
        };

        Ok(Self {
            session,
            transport,
            timeout: Duration::from_secs(timeout_secs),
            message,
        })
    }
}

/// Run two sessions against each other and wait until chat crosses over.
pub async fn run(options: LoopbackOptions) -> Result<()> {
    println!("{}", "Starting loopback session...".green().bold());
    println!("   Room: {}", options.session.room);

    let relay = LocalRelay::new();
    let factory = Arc::new(RtcEngineFactory::new(options.transport.clone()));
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();

    let mut peers = Vec::new();
    for index in 0..2 {
        let identity = PeerIdentity::generate();
        let name = format!("peer-{}", index + 1);
        println!("   {} is {}", name.bold(), identity);

        let observer = ConsoleObserver::new(index, &name, updates_tx.clone());
        let (handle, task) = Session::spawn(
            identity,
            options.session.clone(),
            Box::new(observer),
            Arc::new(relay.client()),
            factory.clone(),
        );
        peers.push((handle, task));
    }
    drop(updates_tx);

    let outcome = tokio::time::timeout(options.timeout, async {
        let mut connected = [false; 2];
        let mut chat_sent = false;

        while let Some(update) = updates_rx.recv().await {
            match update {
                PeerUpdate::Status(index, status) => {
                    connected[index] = status == ConnectionStatus::Connected;
                }
                PeerUpdate::Chat(index, message) => {
                    if index == 1 && message.text == options.message {
                        return true;
                    }
                }
            }

            if connected == [true, true] && !chat_sent {
                info!("Both peers connected, sending chat");
                peers[0].0.send_chat(options.message.clone()).await.ok();
                chat_sent = true;
            }
        }
        false
    })
    .await;

    for (handle, _) in &peers {
        let _ = handle.leave().await;
    }
    for (_, task) in peers {
        let _ = task.await;
    }

    match outcome {
        Ok(true) => {
            println!("{}", "Loopback completed successfully!".green().bold());
            Ok(())
        }
        Ok(false) => bail!("Sessions stopped before the peers connected"),
        Err(_) => bail!(
            "Peers did not connect within {}s",
            options.timeout.as_secs()
        ),
    }
}
