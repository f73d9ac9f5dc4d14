mod sink;
mod sweeper;

pub use sink::{NotificationSink, TracingSink};
pub use sweeper::{run_sweeper, sweep_once};
