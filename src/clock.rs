use chrono::{Local, NaiveDateTime};

/// Local wall time followed by a literal `Z`. The zone suffix is not a real
/// UTC marker; downstream consumers expect this exact shape.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%TZ";

pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn format_timestamp(time: NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}
