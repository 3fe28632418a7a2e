pub mod cli;
pub mod commands;
pub mod qsnp;
pub mod utils;
