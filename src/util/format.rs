use time::{
    format_description::{self, well_known::Rfc3339},
    OffsetDateTime, PrimitiveDateTime,
};

/// Floors `value` and groups thousands with spaces: `1234567.9 -> "1 234 567"`.
pub fn format_kamas(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let floored = value.floor();
    let digits = format!("{:.0}", floored.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if floored < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Parses backend timestamps, with or without an offset (naive ones are UTC).
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }

    let patterns = [
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]:[second]",
    ];
    patterns.iter().find_map(|pattern| {
        let description = format_description::parse(pattern).ok()?;
        PrimitiveDateTime::parse(raw, &description)
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    })
}

/// Current UTC time as RFC 3339, the shape the backend stores.
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// `dd/mm/yyyy hh:mm`, or a placeholder when the date is missing or unreadable.
pub fn format_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return "unknown date".to_string();
    };

    let formatted = parse_timestamp(raw.trim()).and_then(|date| {
        let description = format_description::parse("[day]/[month]/[year] [hour]:[minute]").ok()?;
        date.format(&description).ok()
    });
    formatted.unwrap_or_else(|| "invalid date".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kamas_are_grouped_by_thousands() {
        assert_eq!(format_kamas(1_234_567.9), "1 234 567");
        assert_eq!(format_kamas(999.0), "999");
        assert_eq!(format_kamas(1000.0), "1 000");
        assert_eq!(format_kamas(0.4), "0");
        assert_eq!(format_kamas(-50.0), "-50");
        assert_eq!(format_kamas(-1500.5), "-1 501");
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(150.0), "150.00%");
        assert_eq!(format_percent(66.666), "66.67%");
    }

    #[test]
    fn naive_and_offset_timestamps_parse() {
        assert_eq!(format_date(Some("2025-03-07T18:05:09Z")), "07/03/2025 18:05");
        assert_eq!(format_date(Some("2025-03-07T18:05:09.123456")), "07/03/2025 18:05");
        assert_eq!(format_date(None), "unknown date");
        assert_eq!(format_date(Some("yesterday")), "invalid date");
        assert!(parse_timestamp(&now_timestamp()).is_some());
    }
}
