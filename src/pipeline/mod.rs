//! Composition wizard
//!
//! - `state`: the stage machine (pure)
//! - `session`: drives collaborators and feeds results to the stage machine
//! - `store`: live sessions by id

mod state;
mod session;
mod store;

pub use state::{PipelineState, Product, SlotOutcome, Stage};
pub use session::{PipelineContext, PipelineSession, SessionError};
pub use store::SessionStore;
