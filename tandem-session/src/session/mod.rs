mod announcement_scheduler;
mod ice_candidate_queue;
mod negotiation_phase;
mod one_shot;
mod reconnection_manager;
mod session;
mod session_command;
mod session_config;
mod session_observer;

pub use announcement_scheduler::*;
pub use ice_candidate_queue::*;
pub use negotiation_phase::*;
pub use one_shot::*;
pub use reconnection_manager::*;
pub use session::*;
pub use session_command::*;
pub use session_config::*;
pub use session_observer::*;
