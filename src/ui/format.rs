use std::fmt::Display;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// `HH:MM` in the viewer's timezone.
pub fn message_time<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    at.with_timezone(tz).format("%H:%M").to_string()
}

/// Sidebar label for the last message: time today, "Yesterday", weekday
/// within a week, full date otherwise.
pub fn last_message_label<Tz: TimeZone>(at: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let local = at.with_timezone(&now.timezone());
    let today = now.date_naive();
    let day = local.date_naive();

    if day == today {
        local.format("%H:%M").to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else if now.clone().signed_duration_since(local.clone()) < Duration::days(7) {
        local.format("%a").to_string()
    } else {
        local.format("%d/%m/%Y").to_string()
    }
}

/// Uppercased first letter of `name`, for avatars.
pub fn initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

const AVATAR_PALETTE: [[u8; 3]; 8] = [
    [0xef, 0x44, 0x44],
    [0xf9, 0x73, 0x16],
    [0xea, 0xb3, 0x08],
    [0x22, 0xc5, 0x5e],
    [0x14, 0xb8, 0xa6],
    [0x3b, 0x82, 0xf6],
    [0x8b, 0x5c, 0xf6],
    [0xec, 0x48, 0x99],
];

/// Stable avatar colour derived from the name.
pub fn avatar_rgb(name: &str) -> [u8; 3] {
    let sum: usize = name.chars().map(|c| c as usize).sum();
    AVATAR_PALETTE[sum % AVATAR_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn same_day_shows_clock_time() {
        let now = at(2025, 6, 11, 18, 0);
        assert_eq!(last_message_label(at(2025, 6, 11, 9, 5), &now), "09:05");
    }

    #[test]
    fn previous_day_shows_yesterday() {
        let now = at(2025, 6, 11, 0, 30);
        assert_eq!(last_message_label(at(2025, 6, 10, 23, 59), &now), "Yesterday");
    }

    #[test]
    fn within_a_week_shows_weekday() {
        let now = at(2025, 6, 11, 12, 0);
        // 2025-06-07 was a Saturday
        assert_eq!(last_message_label(at(2025, 6, 7, 12, 0), &now), "Sat");
    }

    #[test]
    fn older_messages_show_full_date() {
        let now = at(2025, 6, 11, 12, 0);
        assert_eq!(last_message_label(at(2025, 5, 2, 12, 0), &now), "02/05/2025");
    }

    #[test]
    fn message_time_is_hours_and_minutes() {
        assert_eq!(message_time(at(2025, 1, 1, 7, 3), &Utc), "07:03");
    }

    #[test]
    fn initial_and_colour_are_stable() {
        assert_eq!(initial("bob"), "B");
        assert_eq!(initial(""), "");
        assert_eq!(avatar_rgb("Bob"), avatar_rgb("Bob"));
    }
}
