/// Core module contains the judging domain and the stages a submission
/// goes through, independent of how processes are actually spawned.
pub mod compare;
pub mod domain;
pub mod errors;
pub mod judge;
pub mod pipeline;
pub mod registry;
pub mod traits;
pub mod workspace;
