use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tandem_core::{IceCandidate, SdpKind, SessionDescription};
use tandem_session::{
    CaptureSource, ConnectionEngine, EngineConnectionState, EngineEvent, EngineFactory,
    EngineGeneration, RemoteTrack, SignalingState,
};
use tokio::sync::mpsc;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// A call the session made on a mock engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateDataChannel(String),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(String),
    AddTrack(String),
    Close,
}

/// Knobs for how a mock engine misbehaves.
#[derive(Debug, Clone, Default)]
pub struct EngineBehavior {
    pub fail_offer: bool,
    pub fail_remote_description: bool,
    pub rejected_candidates: Vec<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    signaling: SignalingState,
    connection: EngineConnectionState,
    has_remote: bool,
    closed: bool,
    offers: u32,
    calls: Vec<EngineCall>,
    applied: Vec<String>,
}

/// Test-side view of one mock engine.
#[derive(Clone)]
pub struct EngineProbe {
    generation: EngineGeneration,
    state: Arc<Mutex<EngineState>>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl EngineProbe {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    pub fn generation(&self) -> EngineGeneration {
        self.generation
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.lock().signaling
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.lock().applied.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn has_remote_description(&self) -> bool {
        self.lock().has_remote
    }

    /// Move the engine to `state` and report it the way a real engine would.
    pub async fn set_connection_state(&self, state: EngineConnectionState) {
        self.lock().connection = state;
        self.emit(EngineEvent::ConnectionStateChanged(self.generation, state))
            .await;
    }

    pub async fn emit_candidate(&self, candidate: IceCandidate) {
        self.emit(EngineEvent::CandidateGenerated(self.generation, candidate))
            .await;
    }

    pub async fn emit_track(&self, track: RemoteTrack) {
        self.emit(EngineEvent::TrackReceived(self.generation, track))
            .await;
    }

    async fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event).await;
    }
}

pub struct MockEngine {
    probe: EngineProbe,
    behavior: EngineBehavior,
}

impl MockEngine {
    fn record(&self, call: EngineCall) -> MutexGuard<'_, EngineState> {
        let mut state = self.probe.lock();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl ConnectionEngine for MockEngine {
    async fn create_data_channel(&self, label: &str) -> Result<()> {
        self.record(EngineCall::CreateDataChannel(label.to_owned()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let mut state = self.record(EngineCall::CreateOffer);
        if self.behavior.fail_offer || state.closed {
            bail!("offer creation failed");
        }
        state.offers += 1;
        Ok(SessionDescription::offer(format!(
            "v=0 offer {} {}",
            self.probe.generation, state.offers
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let state = self.record(EngineCall::CreateAnswer);
        if state.signaling != SignalingState::HaveRemoteOffer {
            bail!("cannot answer in {:?}", state.signaling);
        }
        Ok(SessionDescription::answer(format!(
            "v=0 answer {}",
            self.probe.generation
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.record(EngineCall::SetLocal(desc.kind));
        state.signaling = match (desc.kind, state.signaling) {
            (SdpKind::Offer, SignalingState::Stable | SignalingState::HaveLocalOffer) => {
                SignalingState::HaveLocalOffer
            }
            (SdpKind::Answer, SignalingState::HaveRemoteOffer) => SignalingState::Stable,
            (SdpKind::Rollback, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            (kind, current) => bail!("invalid local {:?} in {:?}", kind, current),
        };
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.record(EngineCall::SetRemote(desc.kind));
        if self.behavior.fail_remote_description {
            bail!("remote description rejected");
        }
        state.signaling = match (desc.kind, state.signaling) {
            (SdpKind::Offer, SignalingState::Stable) => SignalingState::HaveRemoteOffer,
            (SdpKind::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            (kind, current) => bail!("invalid remote {:?} in {:?}", kind, current),
        };
        state.has_remote = true;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let mut state = self.record(EngineCall::AddCandidate(candidate.candidate.clone()));
        if !state.has_remote {
            bail!("no remote description");
        }
        if self.behavior.rejected_candidates.contains(&candidate.candidate) {
            bail!("candidate rejected");
        }
        state.applied.push(candidate.candidate);
        Ok(())
    }

    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()> {
        self.record(EngineCall::AddTrack(track.id().to_owned()));
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.probe.lock().has_remote
    }

    fn signaling_state(&self) -> SignalingState {
        self.probe.lock().signaling
    }

    fn connection_state(&self) -> EngineConnectionState {
        self.probe.lock().connection
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.record(EngineCall::Close);
        state.closed = true;
        state.signaling = SignalingState::Closed;
        state.connection = EngineConnectionState::Closed;
        Ok(())
    }
}

#[derive(Default)]
struct FactoryState {
    behavior: EngineBehavior,
    failing_builds: usize,
    probes: Vec<EngineProbe>,
}

/// Builds [`MockEngine`]s and keeps a probe for each one.
#[derive(Clone, Default)]
pub struct MockEngineFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: EngineBehavior) -> Self {
        let factory = Self::default();
        factory.set_behavior(behavior);
        factory
    }

    /// Behavior of every engine built from now on.
    pub fn set_behavior(&self, behavior: EngineBehavior) {
        self.state.lock().unwrap().behavior = behavior;
    }

    pub fn fail_next_builds(&self, count: usize) {
        self.state.lock().unwrap().failing_builds = count;
    }

    pub fn built(&self) -> usize {
        self.state.lock().unwrap().probes.len()
    }

    /// Probe of the `n`th successfully built engine, counting from 1.
    pub fn probe(&self, n: usize) -> EngineProbe {
        self.state.lock().unwrap().probes[n - 1].clone()
    }

    pub fn latest(&self) -> EngineProbe {
        let state = self.state.lock().unwrap();
        state.probes.last().cloned().expect("no engine built yet")
    }

    /// Wait for at least `count` engines to be built.
    pub async fn wait_for_engines(&self, count: usize, timeout_ms: u64) -> bool {
        let waited = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            while self.built() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        waited.is_ok()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn build(
        &self,
        generation: EngineGeneration,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<Box<dyn ConnectionEngine>> {
        let mut state = self.state.lock().unwrap();
        if state.failing_builds > 0 {
            state.failing_builds -= 1;
            bail!("engine construction failure injected by test");
        }

        let probe = EngineProbe {
            generation,
            state: Arc::new(Mutex::new(EngineState::default())),
            event_tx,
        };
        state.probes.push(probe.clone());

        Ok(Box::new(MockEngine {
            probe,
            behavior: state.behavior.clone(),
        }))
    }
}

/// Capture source backed by a silent Opus track.
pub struct MockCaptureSource {
    track: Arc<TrackLocalStaticSample>,
    stopped: AtomicBool,
}

impl MockCaptureSource {
    pub fn audio(id: &str) -> Arc<Self> {
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            id.to_owned(),
            "tandem-test".to_owned(),
        );

        Arc::new(Self {
            track: Arc::new(track),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl CaptureSource for MockCaptureSource {
    fn track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
