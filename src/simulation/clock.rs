use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

/// Source of "now" for the playback loop.
pub trait Clock {
    fn now(&mut self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Synthetic clock that advances a fixed step on every reading, for
/// watching a whole day play out in minutes.
#[derive(Debug, Clone)]
pub struct AcceleratedClock {
    current: NaiveDateTime,
    step: TimeDelta,
}

impl AcceleratedClock {
    pub fn new(start: NaiveDateTime, seconds_per_reading: u32) -> Self {
        AcceleratedClock {
            current: start,
            step: TimeDelta::seconds(i64::from(seconds_per_reading)),
        }
    }

    /// Start at midnight of `date`.
    pub fn from_midnight(date: NaiveDate, seconds_per_reading: u32) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN), seconds_per_reading)
    }
}

impl Clock for AcceleratedClock {
    fn now(&mut self) -> NaiveDateTime {
        let reading = self.current;
        self.current += self.step;
        reading
    }
}
