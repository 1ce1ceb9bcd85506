// The three user-facing workflows, built on the remote shim.

pub mod attach;
pub mod convert;
pub mod run;

pub use attach::{AttachOutcome, attach};
pub use convert::{ConvertRequest, Source, convert, sanitize_tag};
pub use run::{JobCommand, run_job};
