// 分层结构：领域 / 应用 / 基础设施 / 展示
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

// 重新导出主要类型
pub use domain::{ExclusionPolicy, FileRegistry, LineSearcher, SearchRequest, Walker};
pub use application::{Config, Dispatcher, Engine};
pub use infrastructure::{GrepCommand, Logger, LoggerTrait};
pub use presentation::{OutputFormat, Renderer};
