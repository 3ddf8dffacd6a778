pub mod error;
pub mod session;
pub mod signaling;
pub mod transport;

pub use error::SessionError;
pub use session::*;
pub use signaling::*;
pub use transport::*;
