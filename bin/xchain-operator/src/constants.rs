use std::time::Duration;

pub(crate) const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10);

pub(crate) const DEFAULT_THREAD_COUNT: usize = 2;
