//! pt-BR display formatting for prices, counts, ratings and timestamps.

use crate::ratings::AggregateRating;
use chrono::{DateTime, Utc};

/// `None` is free; prices use two decimals and a decimal comma.
///
/// `format_price(Some(49.9))` is `"R$ 49,90"`.
pub fn format_price(price: Option<f64>) -> String {
    match price {
        None => "Gratuito".to_string(),
        Some(p) => format!("R$ {:.2}", p).replace('.', ","),
    }
}

/// Compact counts: `1.2M`, `3.4k`, or the plain number below a thousand.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// One-decimal average, or `-` for an entity nobody has rated.
pub fn format_average(rating: &AggregateRating) -> String {
    match rating.average {
        Some(avg) if rating.count > 0 => format!("{:.1}", avg),
        _ => "-".to_string(),
    }
}

/// Relative time in pt-BR ("há 3 dias"), falling back to `dd/mm/yyyy`
/// after thirty days.
pub fn format_distance_to_now(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    let minutes = seconds.div_euclid(60);
    let hours = minutes.div_euclid(60);
    let days = hours.div_euclid(24);

    if seconds < 60 {
        "agora mesmo".to_string()
    } else if minutes < 60 {
        format!("há {} {}", minutes, plural(minutes, "minuto", "minutos"))
    } else if hours < 24 {
        format!("há {} {}", hours, plural(hours, "hora", "horas"))
    } else if days < 30 {
        format!("há {} {}", days, plural(days, "dia", "dias"))
    } else {
        then.format("%d/%m/%Y").to_string()
    }
}

fn plural(n: i64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::{aggregate_ratings, RatingRecord};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(None), "Gratuito");
        assert_eq!(format_price(Some(49.9)), "R$ 49,90");
        assert_eq!(format_price(Some(0.0)), "R$ 0,00");
        assert_eq!(format_price(Some(1200.5)), "R$ 1200,50");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5k");
        assert_eq!(format_count(2_300_000), "2.3M");
    }

    #[test]
    fn test_format_average() {
        assert_eq!(format_average(&AggregateRating::default()), "-");
        let agg = aggregate_ratings(&[RatingRecord::new(5.0), RatingRecord::new(4.0), RatingRecord::new(3.0)]);
        assert_eq!(format_average(&agg), "4.0");
    }

    #[test]
    fn test_format_distance_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        assert_eq!(format_distance_to_now(now - Duration::seconds(30), now), "agora mesmo");
        assert_eq!(format_distance_to_now(now - Duration::minutes(1), now), "há 1 minuto");
        assert_eq!(format_distance_to_now(now - Duration::minutes(45), now), "há 45 minutos");
        assert_eq!(format_distance_to_now(now - Duration::hours(1), now), "há 1 hora");
        assert_eq!(format_distance_to_now(now - Duration::hours(5), now), "há 5 horas");
        assert_eq!(format_distance_to_now(now - Duration::days(1), now), "há 1 dia");
        assert_eq!(format_distance_to_now(now - Duration::days(29), now), "há 29 dias");
        assert_eq!(format_distance_to_now(now - Duration::days(40), now), "10/04/2024");
        // Timestamps in the future read as "just now"
        assert_eq!(format_distance_to_now(now + Duration::hours(2), now), "agora mesmo");
    }
}
