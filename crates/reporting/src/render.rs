//! Cell text formatting shared by every worksheet.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};

/// "$1234.50"; negatives render as "$-12.00".
#[must_use]
pub fn money(value: Decimal) -> String {
    format!("${}", fixed2(value))
}

/// "12.34%".
#[must_use]
pub fn percent(value: Decimal) -> String {
    format!("{}%", fixed2(value))
}

/// Two decimal places, half away from zero.
#[must_use]
pub fn fixed2(value: Decimal) -> String {
    format!(
        "{:.2}",
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Shortest exact representation: 10.000 → "10", 0.50 → "0.5".
#[must_use]
pub fn plain(value: Decimal) -> String {
    value.normalize().to_string()
}

/// `plain` for present values, "N/A" otherwise.
#[must_use]
pub fn optional(value: Option<Decimal>) -> String {
    value.map_or_else(|| "N/A".to_string(), plain)
}

/// Renders a timestamp in `tz` as "05/02/2024 10:31 AM".
#[must_use]
pub fn local_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%m/%d/%Y %I:%M %p").to_string()
}

/// Upper-cases the first character and lower-cases the rest.
#[must_use]
pub fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Parses an IANA zone name, falling back to US Eastern.
#[must_use]
pub fn timezone(name: &str) -> Tz {
    name.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone = name, "unknown timezone, using America/New_York");
        chrono_tz::America::New_York
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn money_rounds_half_away_from_zero() {
        assert_eq!(money(dec!(1234.5)), "$1234.50");
        assert_eq!(money(dec!(0.005)), "$0.01");
        assert_eq!(money(dec!(-12)), "$-12.00");
        assert_eq!(percent(dec!(33.333)), "33.33%");
    }

    #[test]
    fn plain_drops_trailing_zeros() {
        assert_eq!(plain(dec!(10.00000000)), "10");
        assert_eq!(plain(dec!(0.50)), "0.5");
        assert_eq!(optional(None), "N/A");
    }

    #[test]
    fn timestamps_render_in_eastern_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 14, 31, 0).unwrap();
        assert_eq!(local_timestamp(at, timezone("America/New_York")), "05/02/2024 10:31 AM");
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 21, 5, 0).unwrap();
        assert_eq!(local_timestamp(winter, timezone("America/New_York")), "01/15/2024 04:05 PM");
    }

    #[test]
    fn unknown_timezone_falls_back() {
        assert_eq!(timezone("Mars/Olympus"), chrono_tz::America::New_York);
    }

    #[test]
    fn capitalize_words() {
        assert_eq!(capitalize("filled"), "Filled");
        assert_eq!(capitalize("SELL"), "Sell");
        assert_eq!(capitalize(""), "");
    }
}
