//! Maeum Agent - the agentic loop runtime
//!
//! One user turn flows: prompt assembly -> streaming from the backend ->
//! mid-stream tool-block interception -> execute (or suspend for
//! confirmation) -> feed the observation back -> iterate.

pub mod controller;
pub mod interceptor;
pub mod prompt;
pub mod session;

pub use controller::{LoopController, LoopDeps};
pub use interceptor::{ScanEvent, StreamInterceptor};
pub use session::{ParkedLoopState, Session, SessionRegistry};
