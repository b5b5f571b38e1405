//! Concrete adapters backed by the local machine.
//!
//! - [`ProcessSandbox`] -- runs assertions in a spawned interpreter.
//! - [`FilePreview`] -- writes preview markup to a file a browser can load.

pub mod preview;
pub mod process;

pub use preview::FilePreview;
pub use process::{ProcessSandbox, ProcessTestRunner};
