//! Turning elapsed occurrences into rewards: weighted sampling and the
//! accumulator that commits a flush.

pub mod accumulator;
pub mod sampler;

pub use accumulator::{Accumulator, AppliedDeltas};
pub use sampler::{run_sample, sample_plan, SampleOutcome, SamplePlan};
