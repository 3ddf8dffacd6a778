use std::sync::Arc;
use webrtc::track::track_local::TrackLocal;

/// A locally captured media track (microphone, camera, screen).
///
/// Capture itself lives outside the session. The session attaches the track
/// to every engine it builds and calls [`CaptureSource::stop`] on teardown.
pub trait CaptureSource: Send + Sync {
    fn track(&self) -> Arc<dyn TrackLocal + Send + Sync>;

    fn stop(&self);
}
