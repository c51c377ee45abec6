//! Daily wall-clock schedule computation.
//! "09:00" fires every day at 09:00 local time.
//!
//! Times falling into a DST gap fire at the first valid instant after it;
//! times repeated by a DST fold fire once, at the earlier instant.

use chrono::{DateTime, Duration, LocalResult, NaiveTime, TimeZone};

/// First occurrence of `time` strictly after `after`, in `after`'s time zone.
pub fn next_daily_run<Tz: TimeZone>(time: NaiveTime, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = after.timezone();
    let today = after.date_naive();

    for offset in 0..=2 {
        let date = today + Duration::days(offset);
        let naive = date.and_time(time);
        let candidate = match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => resolve_gap(&tz, naive),
        };
        if let Some(candidate) = candidate
            && candidate > *after
        {
            return Some(candidate);
        }
    }

    None
}

/// Step forward minute by minute until the local time exists again.
fn resolve_gap<Tz: TimeZone>(tz: &Tz, naive: chrono::NaiveDateTime) -> Option<DateTime<Tz>> {
    (1..=180).find_map(|m| tz.from_local_datetime(&(naive + Duration::minutes(m))).earliest())
}

/// How long to sleep from `now` until `target` (zero if already past).
pub fn duration_until<Tz: TimeZone>(target: &DateTime<Tz>, now: &DateTime<Tz>) -> std::time::Duration {
    (target.clone() - now.clone()).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_later_today() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = next_daily_run(at(9, 0), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 22, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_already_passed_rolls_to_tomorrow() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 18, 30, 0).unwrap();
        let next = next_daily_run(at(18, 0), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_exact_time_is_not_repeated() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 9, 0, 0).unwrap();
        let next = next_daily_run(at(9, 0), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_month_rollover() {
        let after = Utc.with_ymd_and_hms(2026, 1, 31, 23, 0, 0).unwrap();
        let next = next_daily_run(at(9, 0), &after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_offset_zone() {
        let ict = FixedOffset::east_opt(7 * 3600).unwrap();
        let after = ict.with_ymd_and_hms(2026, 2, 22, 8, 59, 0).unwrap();
        let next = next_daily_run(at(9, 0), &after).unwrap();
        assert_eq!(next.hour(), 9);
        assert_eq!(next.with_timezone(&Utc).hour(), 2);
    }

    #[test]
    fn test_duration_until() {
        let now = Utc.with_ymd_and_hms(2026, 2, 22, 8, 0, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2026, 2, 22, 9, 0, 0).unwrap();
        assert_eq!(duration_until(&target, &now).as_secs(), 3600);
        assert!(duration_until(&now, &target).is_zero());
    }
}
