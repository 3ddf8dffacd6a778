use crate::session::ice_candidate_queue::IceCandidateQueue;
use crate::session::one_shot::{OneShot, TimerEvent};
use crate::transport::{CaptureSource, ConnectionEngine, EngineEvent, EngineFactory, EngineGeneration};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The session's single engine together with its per-instance state.
pub struct EngineSlot {
    pub generation: EngineGeneration,
    pub engine: Box<dyn ConnectionEngine>,
    pub candidates: IceCandidateQueue,
    pub data_channel_created: bool,
}

/// Replaces failed engines with fresh ones.
///
/// Also owns the local capture sources, which must be re-attached to every
/// rebuilt engine, and the debounced restart that follows an engine failure.
pub struct ReconnectionManager {
    factory: Arc<dyn EngineFactory>,
    events_tx: mpsc::Sender<EngineEvent>,
    generation: EngineGeneration,
    sources: Vec<Arc<dyn CaptureSource>>,
    pending_restart: OneShot,
    failure_delay: Duration,
}

impl ReconnectionManager {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        events_tx: mpsc::Sender<EngineEvent>,
        failure_delay: Duration,
    ) -> Self {
        Self {
            factory,
            events_tx,
            generation: EngineGeneration::default(),
            sources: Vec::new(),
            pending_restart: OneShot::new(),
            failure_delay,
        }
    }

    /// Close `previous` and build the next engine generation.
    ///
    /// The returned slot has an empty candidate queue and every known
    /// capture source attached.
    pub async fn rebuild(&mut self, previous: Option<EngineSlot>) -> Result<EngineSlot> {
        if let Some(previous) = previous {
            close_slot(previous).await;
        }

        self.generation = self.generation.next();
        let generation = self.generation;

        let engine = self
            .factory
            .build(generation, self.events_tx.clone())
            .await
            .with_context(|| format!("Failed to build engine {generation}"))?;

        for source in &self.sources {
            if let Err(e) = engine.add_track(source.track()).await {
                warn!("Failed to attach local track to engine {}: {:?}", generation, e);
            }
        }

        info!("Engine {} ready with {} local track(s)", generation, self.sources.len());

        Ok(EngineSlot {
            generation,
            engine,
            candidates: IceCandidateQueue::new(),
            data_channel_created: false,
        })
    }

    /// Remember `source` for future engines and attach it to `current`.
    pub async fn add_source(&mut self, source: Arc<dyn CaptureSource>, current: Option<&EngineSlot>) {
        if let Some(slot) = current
            && let Err(e) = slot.engine.add_track(source.track()).await
        {
            warn!("Failed to attach local track to engine {}: {:?}", slot.generation, e);
        }
        self.sources.push(source);
    }

    pub fn stop_sources(&mut self) {
        for source in self.sources.drain(..) {
            source.stop();
        }
    }

    /// Arm the delayed restart; a newer failure replaces the pending one.
    pub fn schedule_restart(&mut self, timer_tx: mpsc::Sender<TimerEvent>) {
        self.pending_restart
            .arm(self.failure_delay, timer_tx, |epoch| TimerEvent::RestartDue { epoch });
    }

    pub fn cancel_restart(&mut self) {
        self.pending_restart.cancel();
    }

    /// Whether a `RestartDue` fire with `epoch` is still current.
    pub fn restart_due(&mut self, epoch: u64) -> bool {
        self.pending_restart.fire(epoch)
    }
}

pub async fn close_slot(slot: EngineSlot) {
    if let Err(e) = slot.engine.close().await {
        warn!("Failed to close engine {}: {:?}", slot.generation, e);
    }
}
