use crate::transport::connection_engine::{
    ConnectionEngine, EngineConnectionState, EngineFactory, EngineGeneration, IceConnectionState,
    MediaKind, RemoteTrack, SignalingState,
};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::EngineEvent;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::{IceCandidate, SdpKind, SessionDescription};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// [`ConnectionEngine`] backed by a `webrtc` peer connection.
pub struct RtcEngine {
    generation: EngineGeneration,
    peer_connection: Arc<RTCPeerConnection>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl RtcEngine {
    /// Build a peer connection and wire its callbacks into `event_tx`.
    pub async fn new(
        generation: EngineGeneration,
        config: &TransportConfig,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Engine {} connection state: {:?}", generation, s);
                    forward(&tx, EngineEvent::ConnectionStateChanged(generation, s.into()));
                })
            },
        ));

        let ice_state_tx = event_tx.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let tx = ice_state_tx.clone();
                Box::pin(async move {
                    forward(&tx, EngineEvent::IceConnectionStateChanged(generation, s.into()));
                })
            },
        ));

        let signaling_tx = event_tx.clone();
        peer_connection.on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
            let tx = signaling_tx.clone();
            Box::pin(async move {
                forward(&tx, EngineEvent::SignalingStateChanged(generation, s.into()));
            })
        }));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                // `None` marks the end of gathering.
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                forward(
                    &tx,
                    EngineEvent::CandidateGenerated(generation, from_rtc_candidate(init)),
                );
            })
        }));

        let track_tx = event_tx.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                Box::pin(async move {
                    let remote = RemoteTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind: track.kind().into(),
                    };
                    debug!("Engine {} received remote track {:?}", generation, remote);
                    forward(&tx, EngineEvent::TrackReceived(generation, remote));
                })
            },
        ));

        let dc_tx = event_tx.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            Box::pin(async move {
                debug!("Engine {} got remote data channel '{}'", generation, dc.label());
                watch_data_channel(generation, &dc, tx);
            })
        }));

        Ok(Self {
            generation,
            peer_connection,
            event_tx,
        })
    }

    /// The engine refuses an empty rollback, so it carries the pending offer.
    async fn rollback_description(&self) -> Result<RTCSessionDescription> {
        let pending = self
            .peer_connection
            .pending_local_description()
            .await
            .context("No pending local offer to roll back")?;

        serde_json::from_value(serde_json::json!({
            "type": "rollback",
            "sdp": pending.sdp,
        }))
        .context("Failed to build rollback description")
    }

    /// Make sure the offer carries a receiving m-line for audio and video.
    async fn ensure_receivers(&self) -> Result<()> {
        let transceivers = self.peer_connection.get_transceivers().await;

        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            if transceivers.iter().any(|t| t.kind() == kind) {
                continue;
            }
            self.peer_connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .with_context(|| format!("Failed to add {:?} receiver", kind))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionEngine for RtcEngine {
    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;
        watch_data_channel(self.generation, &dc, self.event_tx.clone());
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_receivers().await?;
        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = match desc.kind {
            SdpKind::Rollback => self.rollback_description().await?,
            _ => to_rtc_description(desc)?,
        };
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await?;
        Ok(())
    }

    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()> {
        let sender = self
            .peer_connection
            .add_track(track)
            .await
            .context("Failed to add local track")?;

        // RTCP has to be drained for interceptors (NACK, reports) to work.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
        });
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.peer_connection.remote_description().await.is_some()
    }

    fn signaling_state(&self) -> SignalingState {
        self.peer_connection.signaling_state().into()
    }

    fn connection_state(&self) -> EngineConnectionState {
        self.peer_connection.connection_state().into()
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Factory for [`RtcEngine`]s sharing one [`TransportConfig`].
#[derive(Clone, Default)]
pub struct RtcEngineFactory {
    config: TransportConfig,
}

impl RtcEngineFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for RtcEngineFactory {
    async fn build(
        &self,
        generation: EngineGeneration,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<Box<dyn ConnectionEngine>> {
        let engine = RtcEngine::new(generation, &self.config, event_tx).await?;
        Ok(Box::new(engine))
    }
}

fn watch_data_channel(
    generation: EngineGeneration,
    dc: &Arc<RTCDataChannel>,
    tx: mpsc::Sender<EngineEvent>,
) {
    let label = dc.label().to_owned();
    dc.on_open(Box::new(move || {
        let tx = tx.clone();
        let label = label.clone();
        Box::pin(async move {
            info!("Engine {} data channel '{}' open", generation, label);
            forward(&tx, EngineEvent::DataChannelOpened(generation, label));
        })
    }));
}

/// Hand `event` to the session without waiting.
///
/// webrtc runs these callbacks inline, sometimes while the session loop is
/// itself awaiting a call on the same connection.
fn forward(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!("Session event queue full, dropping {:?}", event);
        }
        Err(TrySendError::Closed(_)) => {}
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpKind::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpKind::Rollback => bail!("Rollback is only valid as a local description"),
    };
    Ok(rtc)
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Rollback => SdpKind::Rollback,
        other => bail!("Unsupported SDP type {:?}", other),
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

fn to_rtc_candidate(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: candidate.username_fragment,
    }
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

impl From<RTCPeerConnectionState> for EngineConnectionState {
    fn from(s: RTCPeerConnectionState) -> Self {
        match s {
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
            _ => Self::New,
        }
    }
}

impl From<RTCSignalingState> for SignalingState {
    fn from(s: RTCSignalingState) -> Self {
        match s {
            RTCSignalingState::HaveLocalOffer => Self::HaveLocalOffer,
            RTCSignalingState::HaveRemoteOffer => Self::HaveRemoteOffer,
            RTCSignalingState::HaveLocalPranswer => Self::HaveLocalPranswer,
            RTCSignalingState::HaveRemotePranswer => Self::HaveRemotePranswer,
            RTCSignalingState::Closed => Self::Closed,
            _ => Self::Stable,
        }
    }
}

impl From<RTCIceConnectionState> for IceConnectionState {
    fn from(s: RTCIceConnectionState) -> Self {
        match s {
            RTCIceConnectionState::Checking => Self::Checking,
            RTCIceConnectionState::Connected => Self::Connected,
            RTCIceConnectionState::Completed => Self::Completed,
            RTCIceConnectionState::Disconnected => Self::Disconnected,
            RTCIceConnectionState::Failed => Self::Failed,
            RTCIceConnectionState::Closed => Self::Closed,
            _ => Self::New,
        }
    }
}

impl From<RTPCodecType> for MediaKind {
    fn from(kind: RTPCodecType) -> Self {
        match kind {
            RTPCodecType::Audio => Self::Audio,
            RTPCodecType::Video => Self::Video,
            _ => Self::Unknown,
        }
    }
}
