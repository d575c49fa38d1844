pub mod config;
pub mod dispatch;

pub use config::{read_roots_file, Config, Engine};
pub use dispatch::{DispatchError, DispatchStats, Dispatcher, ReportSink};
