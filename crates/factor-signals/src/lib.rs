//! Per-symbol and global factor scorers.
//!
//! Every module here is a pure mapping from already-fetched market data
//! to a bounded signal record. Fetching, caching, and rate limiting live
//! with the caller; a scorer given no usable data returns an explicit
//! neutral with zero confidence.

pub mod analyst;
pub mod breadth;
pub mod earnings;
pub mod fear_greed;
pub mod intermarket;
pub mod macro_signals;
pub mod ml;
pub mod mtf;
pub mod options;
pub mod sector;
pub mod sentiment;
pub mod short_interest;
