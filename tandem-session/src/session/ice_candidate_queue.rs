use crate::transport::ConnectionEngine;
use std::collections::VecDeque;
use tandem_core::IceCandidate;
use tracing::warn;

/// Candidates that arrived before the remote description.
#[derive(Debug, Default)]
pub struct IceCandidateQueue {
    pending: VecDeque<IceCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub applied: usize,
    pub failed: usize,
}

impl IceCandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, candidate: IceCandidate) {
        self.pending.push_back(candidate);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply every buffered candidate in arrival order.
    ///
    /// A candidate the engine rejects is logged and skipped.
    pub async fn drain_into(&mut self, engine: &dyn ConnectionEngine) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(candidate) = self.pending.pop_front() {
            match engine.add_ice_candidate(candidate).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("Failed to apply buffered ICE candidate: {:?}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
