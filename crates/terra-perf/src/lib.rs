//! Frame-rate sampling, quality tiers and dynamic resolution.

mod controller;

pub use controller::{
    PerfSample, PerformanceController, QualityState, classify_tier, next_resolution_scale,
};
