//! Authentication: session restore, profile resolution and route gating.

pub mod guard;
mod machine;
mod orchestrator;
mod resolver;
mod session;
mod types;

pub use guard::{GuardDecision, evaluate, navigate};
pub use machine::Ticket;
pub use orchestrator::{AuthConfig, AuthOrchestrator, LoginOutcome, SignUpOutcome};
pub use resolver::{AttemptError, PROFILE_SYNC_FAILED, ProfileResolver, ResolveError, ResolvePolicy};
pub use session::SessionStore;
pub use types::{AuthPhase, AuthState, Profile, Role, Status};
