//! Pieces shared by the gadget tools.

mod logger;

pub use logger::{file_level, output_level, setup_logging};
