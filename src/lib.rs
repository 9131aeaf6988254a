pub mod build;
pub mod config;
pub mod error;
pub mod line_ending;
pub mod manifest;
pub mod plan;
pub mod queue;
pub mod script;
pub mod task;
pub mod util;
pub mod workflow;

pub use build::{BuildContext, RenderedBuild, build};
pub use config::{BuildConfig, ExecutionMode, load_config};
pub use error::{PipegenError, Result};
pub use workflow::WorkflowKind;
