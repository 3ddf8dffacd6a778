mod local_relay;
mod signaling_transport;

pub use local_relay::*;
pub use signaling_transport::*;
