//! Cross-process coordination: pause signalling and topic leases.

pub mod lease;
pub mod pause;

pub use lease::LeaseGuard;
pub use pause::{PauseCoordinator, PauseListener};
