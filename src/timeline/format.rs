use chrono::{DateTime, Duration, TimeZone};

/// `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// "Today", "Yesterday", or a short month-day label such as "Mar 5".
pub fn format_date<Tz: TimeZone>(timestamp_ms: i64, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(date) = now.timezone().timestamp_millis_opt(timestamp_ms).earliest() else {
        return String::new();
    };

    let today = now.date_naive();
    let day = date.date_naive();

    if day == today {
        "Today".to_string()
    } else if Some(day) == today.checked_sub_signed(Duration::days(1)) {
        "Yesterday".to_string()
    } else {
        date.format("%b %-d").to_string()
    }
}

/// Wall-clock `HH:MM` in `tz`.
pub fn format_time<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Caption shown for a gap of `days` days.
pub fn gap_message(days: u64) -> String {
    match days {
        0 | 1 => "lived real life for a day".to_string(),
        2..=6 => format!("lived real life for {days} days"),
        7..=13 => "lived real life for a week".to_string(),
        14..=29 => format!("lived real life for {} weeks", days / 7),
        _ => {
            let months = days / 30;
            if months == 1 {
                "lived real life for a month".to_string()
            } else {
                format!("lived real life for {months} months")
            }
        }
    }
}
