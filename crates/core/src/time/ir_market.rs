use anyhow::Context;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use std::collections::HashSet;

// Iran has observed no daylight saving since 2022, so a fixed offset is exact.
const TEHRAN_OFFSET_SECS: i32 = 3 * 3600 + 30 * 60;

// Analysis window (local time, inclusive). Trading closes ~12:30 but late prints keep arriving.
const WINDOW_START_HOUR: u32 = 9;
const WINDOW_END_HOUR: u32 = 16;

pub fn tehran_offset() -> anyhow::Result<FixedOffset> {
    FixedOffset::east_opt(TEHRAN_OFFSET_SECS).context("invalid Tehran offset")
}

pub fn tehran_now() -> anyhow::Result<DateTime<FixedOffset>> {
    Ok(Utc::now().with_timezone(&tehran_offset()?))
}

/// Saturday through Wednesday, minus configured holidays.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !is_weekend(date) && !configured_holidays().contains(&date)
}

pub fn is_market_time(now_utc: DateTime<Utc>) -> anyhow::Result<bool> {
    let local = now_utc.with_timezone(&tehran_offset()?);
    Ok(is_trading_day(local.date_naive())
        && (WINDOW_START_HOUR..=WINDOW_END_HOUR).contains(&local.hour()))
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Thu | chrono::Weekday::Fri)
}

fn configured_holidays() -> HashSet<NaiveDate> {
    // Extend via IR_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD" (lunar holidays move every year).
    let mut out = HashSet::new();
    if let Ok(s) = std::env::var("IR_MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                Ok(d) => {
                    out.insert(d);
                }
                Err(_) => tracing::warn!(value = part, "ignoring malformed IR_MARKET_HOLIDAYS entry"),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_on_saturday_morning() {
        // 2026-10-17 is Saturday; 06:00 UTC = 09:30 Tehran.
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0).unwrap();
        assert!(is_market_time(now).unwrap());
    }

    #[test]
    fn closed_before_window() {
        // 05:00 UTC = 08:30 Tehran.
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 5, 0, 0).unwrap();
        assert!(!is_market_time(now).unwrap());
    }

    #[test]
    fn closed_after_window() {
        // 13:30 UTC = 17:00 Tehran.
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 13, 30, 0).unwrap();
        assert!(!is_market_time(now).unwrap());
    }

    #[test]
    fn closed_on_thursday_and_friday() {
        // 2026-10-15 is Thursday, 2026-10-16 is Friday.
        assert!(!is_trading_day(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()));
        assert!(!is_trading_day(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()));
        assert!(is_trading_day(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()));
    }

    #[test]
    fn local_date_uses_tehran_offset() {
        // 21:00 UTC Wednesday is already 00:30 Thursday in Tehran.
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 21, 0, 0).unwrap();
        let local = now.with_timezone(&tehran_offset().unwrap());
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
    }

    #[test]
    fn offset_is_three_and_a_half_hours_east() {
        assert_eq!(tehran_offset().unwrap().local_minus_utc(), 3 * 3600 + 30 * 60);
    }
}
