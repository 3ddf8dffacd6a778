pub mod mock_engine;
pub mod test_peer;

pub use mock_engine::*;
pub use mock_transport::*;
pub use recording_observer::*;
pub use test_peer::*;
