pub mod runner;

pub use runner::{run_translation, RunError, RunEvent, RunReport, RunRequest};
