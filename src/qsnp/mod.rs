pub mod analysis;
pub mod error;
pub mod model;
pub mod readers;
pub mod workflows;
pub mod writers;
