use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

/// The calendar day of an instant in the process's local timezone.
pub fn local_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

/// Date-only expiry check against an explicit "today".
///
/// A missing timestamp counts as expired — fail-safe toward cleanup.
/// Time-of-day is ignored: a group scheduled for 1 a.m. today is not
/// expired at 11 p.m.
pub fn is_expired_on(scheduled: Option<DateTime<Utc>>, today: NaiveDate) -> bool {
    match scheduled {
        None => true,
        Some(ts) => local_day(ts) < today,
    }
}

/// Whether a group's scheduled day has passed, relative to wall-clock today.
pub fn is_expired(scheduled: Option<DateTime<Utc>>) -> bool {
    is_expired_on(scheduled, Local::now().date_naive())
}

/// Local midnight of `date`, as a UTC instant.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // DST gap at midnight: no local midnight exists, read it as UTC
        LocalResult::None => Utc.from_utc_datetime(&midnight),
    }
}

/// The sweep cutoff: everything scheduled strictly before this is expired.
pub fn start_of_today() -> DateTime<Utc> {
    start_of_day(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    #[test]
    fn yesterday_is_expired() {
        let ts = start_of_day(today()) - Duration::hours(1);
        assert!(is_expired_on(Some(ts), today()));
    }

    #[test]
    fn today_is_not_expired_regardless_of_time() {
        // one second past local midnight
        let early = start_of_day(today()) + Duration::seconds(1);
        assert!(!is_expired_on(Some(early), today()));

        // late evening, same day
        let late = start_of_day(today()) + Duration::hours(23);
        assert!(!is_expired_on(Some(late), today()));
    }

    #[test]
    fn tomorrow_is_not_expired() {
        let ts = start_of_day(today()) + Duration::days(1);
        assert!(!is_expired_on(Some(ts), today()));
    }

    #[test]
    fn missing_timestamp_is_expired() {
        assert!(is_expired_on(None, today()));
        assert!(is_expired(None));
    }

    #[test]
    fn one_day_old_group_expires_exactly_at_the_day_boundary() {
        let scheduled = start_of_day(today()) - Duration::days(1) + Duration::hours(12);
        assert!(is_expired_on(Some(scheduled), today()));
        // …but was fine on its own day
        assert!(!is_expired_on(Some(scheduled), today() - Duration::days(1)));
    }
}
