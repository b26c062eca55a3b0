//! Bar sources that need no network: deterministic synthetic markets.

pub mod synthetic;

pub use synthetic::{linear_bars, SyntheticMarket};
