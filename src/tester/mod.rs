//! Delay and throughput engines and their reporting.

pub mod delay;
pub mod speed;
pub mod summary;

pub use delay::HealthTester;
pub use speed::{speed_label, SpeedReport, SpeedTester, SPEED_TEST_FAILED, SWITCH_FAILED};
pub use summary::{PhaseSummary, RankedNode};
