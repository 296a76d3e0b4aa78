// Deterministic environment for spec runs: injected clock plus seeded RNG.

/// Clock abstractions for deterministic time control
pub mod clock;
/// Seeded random number generation
pub mod rng;

pub use clock::{Clock, PausedClock, SystemClock};
pub use rng::TestRng;
