pub mod engine;
pub mod models;
pub mod monte_carlo;
pub mod walk_forward;


pub use engine::{ai_signal_fn, technical_signal_fn, BacktestEngine, SignalFn};
pub use models::*;
pub use monte_carlo::{run_monte_carlo, MonteCarloResult};
pub use walk_forward::{WalkForwardResult, WalkForwardValidator};
