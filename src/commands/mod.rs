pub mod call;
pub mod stats;
