use async_trait::async_trait;
use colored::*;
use tandem_core::{ChatMessage, ConnectionStatus};
use tandem_session::{RemoteTrack, SessionObserver};
use tokio::sync::mpsc;

/// What the loopback driver needs to know about each peer.
#[derive(Debug)]
pub enum PeerUpdate {
    Status(usize, ConnectionStatus),
    Chat(usize, ChatMessage),
}

/// Prints one peer's session activity and forwards it to the driver.
pub struct ConsoleObserver {
    index: usize,
    label: ColoredString,
    updates: mpsc::UnboundedSender<PeerUpdate>,
}

impl ConsoleObserver {
    pub fn new(index: usize, name: &str, updates: mpsc::UnboundedSender<PeerUpdate>) -> Self {
        let label = match index {
            0 => format!("[{name}]").blue().bold(),
            _ => format!("[{name}]").magenta().bold(),
        };
        Self {
            index,
            label,
            updates,
        }
    }
}

fn paint(status: ConnectionStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        ConnectionStatus::Connected => text.green().bold(),
        ConnectionStatus::Failed => text.red().bold(),
        ConnectionStatus::Disconnected | ConnectionStatus::Reconnecting => text.yellow(),
        _ => text.cyan(),
    }
}

#[async_trait]
impl SessionObserver for ConsoleObserver {
    async fn on_status(&self, status: ConnectionStatus, message: &str) {
        println!("{} {} {}", self.label, paint(status), message.dimmed());
        let _ = self.updates.send(PeerUpdate::Status(self.index, status));
    }

    async fn on_remote_track(&self, track: RemoteTrack) {
        println!(
            "{} remote {:?} track {}",
            self.label, track.kind, track.id
        );
    }

    async fn on_remote_media_cleared(&self) {
        println!("{} remote media cleared", self.label);
    }

    async fn on_chat(&self, message: ChatMessage) {
        println!(
            "{} {} {}",
            self.label,
            format!("<{}>", message.sender_id).bold(),
            message.text
        );
        let _ = self.updates.send(PeerUpdate::Chat(self.index, message));
    }
}
