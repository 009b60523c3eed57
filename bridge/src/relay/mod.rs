/// Relay - the template cache and the two loops that share it

pub mod cache;
pub mod clock;
pub mod poll_loop;
pub mod status;

pub use cache::{CacheReader, TemplateCache};
pub use clock::{Sleeper, TokioSleeper};
pub use poll_loop::{CycleOutcome, PollLoop};
pub use status::{StatusReport, StatusReporter};
