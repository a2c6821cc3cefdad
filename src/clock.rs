use actix_web::HttpRequest;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Source of the current instant for every ledger call.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Best-effort caller address. Advisory only, never used for decisions.
pub fn client_origin(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(str::to_owned)
}

/// Local-day rules of the organisation: which calendar day an instant belongs
/// to, and when the working day ends.
#[derive(Debug, Clone, Copy)]
pub struct WorkCalendar {
    offset: FixedOffset,
    day_end: NaiveTime,
}

impl WorkCalendar {
    pub fn new(offset: FixedOffset, day_end: NaiveTime) -> Self {
        Self { offset, day_end }
    }

    pub fn from_minutes(utc_offset_minutes: i32, day_end: NaiveTime) -> Option<Self> {
        FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?).map(|o| Self::new(o, day_end))
    }

    /// Canonical day membership: the local calendar date of the instant.
    pub fn work_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// The fixed end-of-workday instant for `day`.
    pub fn day_end(&self, day: NaiveDate) -> DateTime<Utc> {
        self.at_local(day, self.day_end)
    }

    fn at_local(&self, day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = day.and_time(time);
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&(local - shift))
    }
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Manually advanced clock for tests.
#[cfg(test)]
pub struct FixedClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(std::sync::Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
