mod status;

pub use status::{StatusReport, StatusReporter};
