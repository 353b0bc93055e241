pub mod chart;
pub mod common;
