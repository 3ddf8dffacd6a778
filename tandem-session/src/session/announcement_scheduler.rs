use crate::signaling::SignalingTransport;
use crate::transport::EngineConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{PeerIdentity, SignalEnvelope};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Periodically tells the room we are here until a peer connection exists.
pub struct AnnouncementScheduler {
    initial_delay: Duration,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl AnnouncementScheduler {
    pub fn new(initial_delay: Duration, period: Duration) -> Self {
        Self {
            initial_delay,
            period,
            task: None,
        }
    }

    /// Start announcing, replacing any running announcer.
    ///
    /// The task ends on its own once `engine_state` reads `Connected`.
    pub fn start(
        &mut self,
        transport: Arc<dyn SignalingTransport>,
        identity: PeerIdentity,
        engine_state: watch::Receiver<EngineConnectionState>,
    ) {
        self.stop();

        let initial_delay = self.initial_delay;
        let period = self.period;

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if *engine_state.borrow() == EngineConnectionState::Connected {
                    debug!("Peer connected, announcements finished");
                    break;
                }

                let envelope = SignalEnvelope::announce(identity.clone());
                if let Err(e) = transport.publish(envelope).await {
                    warn!("Failed to publish announce: {:?}", e);
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AnnouncementScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
