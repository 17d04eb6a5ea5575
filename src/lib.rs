//! kiln - static-site asset pipeline
//!
//! kiln turns a source tree into a deployable output tree: markup is
//! minified, SCSS compiled and prefixed, scripts bundled, images
//! recompressed, everything else copied incrementally. A dev server with
//! live reload and a file watcher close the loop.

pub mod config;
pub mod error;
pub mod fs;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod watcher;

// Re-exports for convenience
pub use config::Config;
pub use error::{KilnError, KilnResult};
pub use pipeline::PipelineResult;
pub use server::{serve, Reload, ReloadHub, ServerOptions};
pub use tasks::{clean, run_build, run_task, BuildReport, Task};
pub use watcher::{watch, TaskRouter, WatchEvent, WatchOptions};
