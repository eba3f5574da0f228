//! Time-of-day session heuristic for US equities, used when a provider does
//! not declare the market state itself.

use crate::core::quote::MarketState;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

const PRE_MARKET_OPEN: u32 = 4 * 60;
const REGULAR_OPEN: u32 = 9 * 60 + 30;
const REGULAR_CLOSE: u32 = 16 * 60;
const POST_MARKET_CLOSE: u32 = 20 * 60;

pub fn session_at(now: DateTime<Utc>) -> MarketState {
    let eastern = now.with_timezone(&New_York);
    if matches!(eastern.weekday(), Weekday::Sat | Weekday::Sun) {
        return MarketState::Closed;
    }

    let minutes = eastern.hour() * 60 + eastern.minute();
    match minutes {
        m if m < PRE_MARKET_OPEN => MarketState::Closed,
        m if m < REGULAR_OPEN => MarketState::Pre,
        m if m < REGULAR_CLOSE => MarketState::Regular,
        m if m < POST_MARKET_CLOSE => MarketState::Post,
        _ => MarketState::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_regular_session_during_daylight_saving() {
        // Wednesday 10:00 EDT
        assert_eq!(session_at(utc(2024, 3, 13, 14, 0)), MarketState::Regular);
    }

    #[test]
    fn test_session_boundaries_in_winter() {
        // Wednesday 2024-01-10, EST is UTC-5
        assert_eq!(session_at(utc(2024, 1, 10, 8, 59)), MarketState::Closed);
        assert_eq!(session_at(utc(2024, 1, 10, 13, 0)), MarketState::Pre);
        assert_eq!(session_at(utc(2024, 1, 10, 14, 30)), MarketState::Regular);
        assert_eq!(session_at(utc(2024, 1, 10, 21, 0)), MarketState::Post);
        assert_eq!(session_at(utc(2024, 1, 11, 1, 0)), MarketState::Closed);
    }

    #[test]
    fn test_weekend_is_closed() {
        // Saturday noon Eastern
        assert_eq!(session_at(utc(2024, 1, 13, 17, 0)), MarketState::Closed);
    }
}
