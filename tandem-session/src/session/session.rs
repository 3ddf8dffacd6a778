use crate::session::announcement_scheduler::AnnouncementScheduler;
use crate::session::negotiation_phase::{NegotiationPhase, PhaseEvent};
use crate::session::one_shot::{OneShot, TimerEvent};
use crate::session::reconnection_manager::{EngineSlot, ReconnectionManager, close_slot};
use crate::session::session_command::{SessionCommand, SessionHandle};
use crate::session::session_config::SessionConfig;
use crate::session::session_observer::SessionObserver;
use crate::signaling::SignalingTransport;
use crate::transport::{EngineConnectionState, EngineEvent, EngineFactory, SignalingState};
use anyhow::{Context, Result};
use std::sync::Arc;
use tandem_core::{
    ChatMessage, ConnectionStatus, IceCandidate, PeerIdentity, Role, SessionDescription, Signal,
    SignalEnvelope,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// One participant's side of a two-party connection.
///
/// All state lives here and is mutated only by [`Session::run`], which
/// handles one command, envelope, engine event or timer fire at a time.
pub struct Session {
    identity: PeerIdentity,
    config: SessionConfig,
    observer: Box<dyn SessionObserver>,
    transport: Arc<dyn SignalingTransport>,
    command_rx: mpsc::Receiver<SessionCommand>,
    inbox_tx: mpsc::Sender<SignalEnvelope>,
    inbox_rx: mpsc::Receiver<SignalEnvelope>,
    engine_rx: mpsc::Receiver<EngineEvent>,
    timer_tx: mpsc::Sender<TimerEvent>,
    timer_rx: mpsc::Receiver<TimerEvent>,
    active: Option<EngineSlot>,
    phase: NegotiationPhase,
    announcer: AnnouncementScheduler,
    negotiation_timer: OneShot,
    reconnect: ReconnectionManager,
    engine_state: watch::Sender<EngineConnectionState>,
}

impl Session {
    pub fn new(
        identity: PeerIdentity,
        config: SessionConfig,
        observer: Box<dyn SessionObserver>,
        transport: Arc<dyn SignalingTransport>,
        factory: Arc<dyn EngineFactory>,
        command_rx: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (engine_tx, engine_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (timer_tx, timer_rx) = mpsc::channel(16);
        let (engine_state, _) = watch::channel(EngineConnectionState::New);

        let announcer = AnnouncementScheduler::new(
            config.timing.announce_initial_delay(),
            config.timing.announce_period(),
        );
        let reconnect =
            ReconnectionManager::new(factory, engine_tx, config.timing.failure_restart_delay());

        Self {
            identity,
            config,
            observer,
            transport,
            command_rx,
            inbox_tx,
            inbox_rx,
            engine_rx,
            timer_tx,
            timer_rx,
            active: None,
            phase: NegotiationPhase::default(),
            announcer,
            negotiation_timer: OneShot::new(),
            reconnect,
            engine_state,
        }
    }

    /// Build a session and run it on its own task.
    pub fn spawn(
        identity: PeerIdentity,
        config: SessionConfig,
        observer: Box<dyn SessionObserver>,
        transport: Arc<dyn SignalingTransport>,
        factory: Arc<dyn EngineFactory>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let session = Session::new(identity, config, observer, transport, factory, command_rx);
        let task = tokio::spawn(session.run());
        (SessionHandle::new(command_tx), task)
    }

    pub async fn run(mut self) {
        info!("Session {} joining room {}", self.identity, self.config.room);
        self.set_status(ConnectionStatus::Initializing, "Joining room").await;

        if let Err(e) = self
            .transport
            .subscribe(&self.config.room, self.inbox_tx.clone())
            .await
        {
            error!("Failed to subscribe to room {}: {:?}", self.config.room, e);
        }

        self.start_engine().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave) => {
                            info!("Leave requested");
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All session handles dropped. Shutting down session.");
                            break;
                        }
                    }
                }

                Some(envelope) = self.inbox_rx.recv() => {
                    self.handle_envelope(envelope).await;
                }

                Some(event) = self.engine_rx.recv() => {
                    self.handle_engine_event(event).await;
                }

                Some(timer) = self.timer_rx.recv() => {
                    self.handle_timer(timer).await;
                }
            }
        }

        self.teardown().await;
        info!("Session {} finished", self.identity);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::SendChat { text } => {
                let message = ChatMessage::new(self.identity.clone(), text);
                self.publish(Signal::Chat {
                    chat_message: message.clone(),
                })
                .await;
                self.observer.on_chat(message).await;
            }

            SessionCommand::AddLocalSource(source) => {
                self.reconnect.add_source(source, self.active.as_ref()).await;
            }

            SessionCommand::Restart => self.restart("manual reconnect").await,

            // Handled by the loop itself.
            SessionCommand::Leave => {}
        }
    }

    async fn handle_envelope(&mut self, envelope: SignalEnvelope) {
        if envelope.sender_id == self.identity {
            debug!("Dropping echoed {} envelope", envelope.kind());
            return;
        }

        let sender = envelope.sender_id;
        match envelope.signal {
            Signal::Announce => self.handle_announce(sender).await,

            Signal::Offer { sdp } => {
                if let Err(e) = self.handle_offer(&sender, sdp).await {
                    error!("Failed to answer offer from {}: {:?}", sender, e);
                    self.restart("offer handling failed").await;
                }
            }

            Signal::Answer { sdp } => {
                if let Err(e) = self.handle_answer(&sender, sdp).await {
                    error!("Failed to apply answer from {}: {:?}", sender, e);
                    self.restart("answer handling failed").await;
                }
            }

            Signal::IceCandidate { candidate } => self.handle_remote_candidate(candidate).await,

            Signal::Leave => {
                info!("Peer {} left the room", sender);
                self.observer.on_remote_media_cleared().await;
                self.set_status(ConnectionStatus::WaitingForPeer, "Peer left").await;
                self.restart("peer left").await;
            }

            Signal::Chat { chat_message } => self.observer.on_chat(chat_message).await,
        }
    }

    async fn handle_announce(&mut self, sender: PeerIdentity) {
        match Role::elect(&self.identity, &sender) {
            Some(Role::Initiator) => {
                let Some(slot) = self.active.as_ref() else {
                    debug!("No engine yet, ignoring announce from {}", sender);
                    return;
                };

                let engine_broken = matches!(
                    slot.engine.connection_state(),
                    EngineConnectionState::Failed | EngineConnectionState::Disconnected
                );
                let negotiating = slot.engine.signaling_state() != SignalingState::Stable;
                if negotiating && !engine_broken {
                    debug!("Already negotiating, ignoring announce from {}", sender);
                    return;
                }

                info!("Initiating connection to {}", sender);
                if let Err(e) = self.send_offer().await {
                    error!("Failed to send offer to {}: {:?}", sender, e);
                    self.restart("offer failed").await;
                }
            }
            Some(Role::Follower) => debug!("Waiting for {} to send an offer", sender),
            None => warn!("Peer {} announced with our own identity", sender),
        }
    }

    async fn send_offer(&mut self) -> Result<()> {
        self.announcer.stop();

        let offer = {
            let slot = self.active.as_mut().context("No active engine")?;
            if !slot.data_channel_created {
                slot.engine
                    .create_data_channel(&self.config.data_channel_label)
                    .await
                    .context("Failed to create data channel")?;
                slot.data_channel_created = true;
            }

            let offer = slot.engine.create_offer().await.context("Failed to create offer")?;
            slot.engine
                .set_local_description(offer.clone())
                .await
                .context("Failed to set local offer")?;
            offer
        };

        self.publish(Signal::Offer { sdp: offer }).await;
        self.advance(PhaseEvent::OfferSent);

        self.negotiation_timer.arm(
            self.config.timing.negotiation_timeout(),
            self.timer_tx.clone(),
            |epoch| TimerEvent::NegotiationTimeout { epoch },
        );
        self.set_status(ConnectionStatus::Negotiating, "Offer sent").await;
        Ok(())
    }

    async fn handle_offer(&mut self, sender: &PeerIdentity, offer: SessionDescription) -> Result<()> {
        self.announcer.stop();

        let (answer, connected) = {
            let slot = self.active.as_mut().context("No active engine")?;

            if slot.engine.signaling_state() != SignalingState::Stable {
                info!("Offer collision with {}, rolling back local offer", sender);
                slot.engine
                    .set_local_description(SessionDescription::rollback())
                    .await
                    .context("Failed to roll back local offer")?;
            }

            slot.engine
                .set_remote_description(offer)
                .await
                .context("Failed to apply remote offer")?;

            let report = slot.candidates.drain_into(slot.engine.as_ref()).await;
            if report.applied + report.failed > 0 {
                debug!(
                    "Applied {} buffered candidate(s), {} failed",
                    report.applied, report.failed
                );
            }

            let answer = slot.engine.create_answer().await.context("Failed to create answer")?;
            slot.engine
                .set_local_description(answer.clone())
                .await
                .context("Failed to set local answer")?;
            let connected = slot.engine.connection_state() == EngineConnectionState::Connected;
            (answer, connected)
        };

        self.publish(Signal::Answer { sdp: answer }).await;
        self.advance(PhaseEvent::OfferAnswered);

        if connected {
            self.on_engine_connected().await;
        } else {
            self.set_status(ConnectionStatus::Negotiating, "Answer sent").await;
        }
        Ok(())
    }

    async fn handle_answer(&mut self, sender: &PeerIdentity, answer: SessionDescription) -> Result<()> {
        let connected = {
            let Some(slot) = self.active.as_mut() else {
                return Ok(());
            };

            let signaling = slot.engine.signaling_state();
            if signaling != SignalingState::HaveLocalOffer
                || !self.phase.accepts(PhaseEvent::AnswerApplied)
            {
                debug!(
                    "Ignoring answer from {} ({:?}, {:?})",
                    sender, signaling, self.phase
                );
                return Ok(());
            }

            slot.engine
                .set_remote_description(answer)
                .await
                .context("Failed to apply remote answer")?;

            let report = slot.candidates.drain_into(slot.engine.as_ref()).await;
            if report.applied + report.failed > 0 {
                debug!(
                    "Applied {} buffered candidate(s), {} failed",
                    report.applied, report.failed
                );
            }

            slot.engine.connection_state() == EngineConnectionState::Connected
        };

        self.advance(PhaseEvent::AnswerApplied);

        // A renegotiation on a live transport produces no new state change.
        if connected {
            self.on_engine_connected().await;
        }
        Ok(())
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        let Some(slot) = self.active.as_mut() else {
            return;
        };

        if !slot.engine.has_remote_description().await {
            slot.candidates.enqueue(candidate);
            debug!("Buffered ICE candidate ({} pending)", slot.candidates.len());
            return;
        }

        if let Err(e) = slot.engine.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate: {:?}", e);
        }
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        let current = self.active.as_ref().map(|slot| slot.generation);
        if current != Some(event.generation()) {
            debug!("Dropping event from stale engine {}", event.generation());
            return;
        }

        match event {
            EngineEvent::CandidateGenerated(_, candidate) => {
                self.publish(Signal::IceCandidate { candidate }).await;
            }

            EngineEvent::ConnectionStateChanged(generation, state) => {
                info!("Engine {} connection state: {:?}", generation, state);
                self.engine_state.send_replace(state);

                match state {
                    EngineConnectionState::Connected => self.on_engine_connected().await,
                    EngineConnectionState::Disconnected => {
                        self.set_status(ConnectionStatus::Disconnected, "Connection interrupted")
                            .await;
                    }
                    EngineConnectionState::Failed => {
                        self.set_status(ConnectionStatus::Failed, "Connection failed").await;
                        self.reconnect.schedule_restart(self.timer_tx.clone());
                    }
                    _ => {}
                }
            }

            EngineEvent::IceConnectionStateChanged(generation, state) => {
                debug!("Engine {} ICE state: {:?}", generation, state);
            }

            EngineEvent::SignalingStateChanged(generation, state) => {
                debug!("Engine {} signaling state: {:?}", generation, state);
            }

            EngineEvent::TrackReceived(generation, track) => {
                info!("Engine {} received {:?} track {}", generation, track.kind, track.id);
                self.observer.on_remote_track(track).await;
            }

            EngineEvent::DataChannelOpened(generation, label) => {
                info!("Engine {} data channel '{}' open", generation, label);
            }
        }
    }

    async fn on_engine_connected(&mut self) {
        self.negotiation_timer.cancel();
        self.reconnect.cancel_restart();
        self.announcer.stop();
        self.advance(PhaseEvent::EngineConnected);
        self.set_status(ConnectionStatus::Connected, "Connected to peer").await;
    }

    async fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::NegotiationTimeout { epoch } => {
                if self.negotiation_timer.fire(epoch) {
                    warn!("Negotiation timed out");
                    self.restart("negotiation timed out").await;
                }
            }
            TimerEvent::RestartDue { epoch } => {
                if self.reconnect.restart_due(epoch) {
                    self.restart("connection failed").await;
                }
            }
        }
    }

    /// Throw the current engine away and start discovery from scratch.
    async fn restart(&mut self, reason: &str) {
        info!("Restarting connection: {}", reason);
        self.negotiation_timer.cancel();
        self.reconnect.cancel_restart();
        self.announcer.stop();
        self.set_status(ConnectionStatus::Reconnecting, reason).await;
        self.start_engine().await;
    }

    async fn start_engine(&mut self) {
        let previous = self.active.take();
        self.advance(PhaseEvent::Reset);
        self.engine_state.send_replace(EngineConnectionState::New);

        match self.reconnect.rebuild(previous).await {
            Ok(slot) => self.active = Some(slot),
            Err(e) => {
                error!("Failed to build connection engine: {:?}", e);
                self.set_status(ConnectionStatus::Failed, "Could not create connection")
                    .await;
                self.reconnect.schedule_restart(self.timer_tx.clone());
                return;
            }
        }

        self.set_status(ConnectionStatus::WaitingForPeer, "Waiting for peer").await;
        self.announcer.start(
            self.transport.clone(),
            self.identity.clone(),
            self.engine_state.subscribe(),
        );
    }

    async fn teardown(&mut self) {
        info!("Tearing down session {}", self.identity);

        self.publish(Signal::Leave).await;
        self.transport.unsubscribe().await;

        self.announcer.stop();
        self.negotiation_timer.cancel();
        self.reconnect.cancel_restart();
        self.reconnect.stop_sources();

        if let Some(slot) = self.active.take() {
            close_slot(slot).await;
        }
        self.engine_state.send_replace(EngineConnectionState::Closed);

        self.set_status(ConnectionStatus::Disconnected, "Left the room").await;
    }

    fn advance(&mut self, event: PhaseEvent) {
        if let Err(e) = self.phase.advance(event) {
            warn!("{}", e);
        }
    }

    async fn publish(&self, signal: Signal) {
        let kind = signal.kind();
        let envelope = SignalEnvelope::new(self.identity.clone(), signal);
        if let Err(e) = self.transport.publish(envelope).await {
            warn!("Failed to publish {}: {:?}", kind, e);
        }
    }

    async fn set_status(&self, status: ConnectionStatus, message: &str) {
        info!("Status: {} ({})", status, message);
        self.observer.on_status(status, message).await;
    }
}
