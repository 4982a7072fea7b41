pub mod sizing;

pub use sizing::{size_for, RiskError};
