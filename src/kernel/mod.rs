//! A templated compute kernel together with the machinery to tune it.

pub mod prefix_sum;
pub mod runner;
pub mod template;
pub mod tune;
pub mod tuning;

pub use prefix_sum::{ElementType, Lookback, ParamsError, PrefixSumParams, Reduction};
pub use runner::{KernelRun, PrefixSumKernel, TimingSource};
pub use tune::{tune, TuneOptions, TuneRecord};
