//! Calendar arithmetic for the weekly totals.
//!
//! Hamster stores local wall-clock time and puts it on the bus as if it were UTC, so all
//! boundaries here are computed on naive datetimes and encoded with [`naive_to_wire`].

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use hamster_client::naive_to_wire;

/// The current local wall-clock time, the way hamster sees it.
pub fn hamster_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Weekday of `date` with Monday = 1 and Sunday = 7.
pub fn weekday_index(date: NaiveDate) -> u32 {
    match date.weekday().num_days_from_sunday() {
        0 => 7,
        day => day,
    }
}

/// Monday 00:00:00 of the week containing `today`.
pub fn start_of_week(today: NaiveDate) -> NaiveDateTime {
    let monday = today - Days::new(u64::from(weekday_index(today) - 1));
    monday.and_time(NaiveTime::MIN)
}

/// Sunday 23:59:59 of the week containing `today`.
pub fn end_of_week(today: NaiveDate) -> NaiveDateTime {
    end_of_day(start_of_week(today).date() + Days::new(6))
}

/// 23:59:59 of `day`.
pub fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN) + chrono::Duration::seconds(24 * 60 * 60 - 1)
}

/// Wire-encoded bounds used for the queries of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBounds {
    pub start_of_week: i64,
    pub end_of_week: i64,
    pub end_of_today: i64,
    pub weekday_index: u32,
}

impl WeekBounds {
    pub fn at(now: NaiveDateTime) -> Self {
        let today = now.date();
        WeekBounds {
            start_of_week: naive_to_wire(start_of_week(today)),
            end_of_week: naive_to_wire(end_of_week(today)),
            end_of_today: naive_to_wire(end_of_day(today)),
            weekday_index: weekday_index(today),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        // 2024-05-13 is a Monday
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn test_weekday_index_treats_sunday_as_seven() {
        assert_eq!(weekday_index(date(13)), 1);
        assert_eq!(weekday_index(date(15)), 3);
        assert_eq!(weekday_index(date(19)), 7);
    }

    #[test]
    fn test_week_bounds_for_every_weekday() {
        for day in 13..=19 {
            assert_eq!(start_of_week(date(day)).to_string(), "2024-05-13 00:00:00", "start for May {}", day);
            assert_eq!(end_of_week(date(day)).to_string(), "2024-05-19 23:59:59", "end for May {}", day);
        }
    }

    #[test]
    fn test_wednesday_starts_two_days_earlier() {
        assert_eq!(date(15) - start_of_week(date(15)).date(), chrono::Duration::days(2));
    }

    #[test]
    fn test_sunday_starts_six_days_earlier() {
        assert_eq!(date(19) - start_of_week(date(19)).date(), chrono::Duration::days(6));
    }

    #[test]
    fn test_week_crossing_month_boundary() {
        let friday = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(start_of_week(friday).to_string(), "2024-02-26 00:00:00");
        assert_eq!(end_of_week(friday).to_string(), "2024-03-03 23:59:59");
    }

    #[test]
    fn test_bounds_are_wire_encoded() {
        let now = date(15).and_hms_opt(14, 30, 0).unwrap();
        let bounds = WeekBounds::at(now);
        assert_eq!(bounds.start_of_week, 1_715_558_400);
        assert_eq!(bounds.end_of_today, 1_715_817_599);
        assert_eq!(bounds.end_of_week, 1_716_163_199);
        assert_eq!(bounds.weekday_index, 3);
    }
}
