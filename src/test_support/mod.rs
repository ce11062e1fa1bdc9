//! Helpers shared by unit and integration tests.

mod logging;
mod stub;

pub use logging::capture_logs;
pub use stub::{stub_script, write_stub_tool};
