use crate::error::SessionError;
use crate::transport::CaptureSource;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Commands from the application into a running session.
pub enum SessionCommand {
    /// Send a chat message to the peer over the relay.
    SendChat { text: String },

    /// Attach a local track now and to every engine built later.
    AddLocalSource(Arc<dyn CaptureSource>),

    /// Tear down the current engine and start discovery again.
    Restart,

    /// Leave the room and shut the session down.
    Leave,
}

/// Cloneable handle to a running session.
///
/// The session shuts down once every handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SendChat { text: text.into() }).await
    }

    pub async fn add_local_source(&self, source: Arc<dyn CaptureSource>) -> Result<(), SessionError> {
        self.send(SessionCommand::AddLocalSource(source)).await
    }

    pub async fn restart(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Restart).await
    }

    pub async fn leave(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Leave).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(cmd).await.map_err(|_| SessionError::Closed)
    }
}
