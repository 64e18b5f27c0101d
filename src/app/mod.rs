//! The collaborator interface a presentation layer drives: start a run, receive
//! progress and the final report as events, cancel.

pub mod events;
pub mod proxy;
pub mod state;
pub mod tasks;

pub use events::RunEvent;
pub use proxy::EventProxy;
pub use state::AppState;
