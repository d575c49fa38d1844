pub mod grep_process;
pub mod logging;

pub use grep_process::GrepCommand;
pub use logging::{Logger, LoggerTrait, RunTotals};
