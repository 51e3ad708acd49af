pub mod plan;
pub mod schema;

pub use plan::CapturePlan;
pub use schema::{BrowserConfig, Config, PageConfig, PrepareConfig, Size, VideoConfig};
