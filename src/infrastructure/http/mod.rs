//! HTTP surface — pins the engine's external contract only (spec.md
//! section 6); auth, the OpenAI-compatible relay, and reporting scripts
//! remain out of scope.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
