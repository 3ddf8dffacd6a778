mod capture_source;
mod connection_engine;
mod rtc_engine;
mod transport_config;
mod transport_event;

pub use capture_source::*;
pub use connection_engine::*;
pub use rtc_engine::*;
pub use transport_config::*;
pub use transport_event::*;
