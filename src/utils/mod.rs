mod config;
mod readers;
mod util;

pub use config::Config;
pub use readers::{input_extension, open_input_reader, read_head_lines};
pub use util::{handle_error_and_exit, Result};
