pub mod display;

pub use display::{format_age, format_duration, truncate_line, OutputFormat, Renderer};
