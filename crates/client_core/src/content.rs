//! Display helpers and the static reflection / info content.

use crate::schedule_admin::parse_iso;

pub struct InfoCard {
    pub title: &'static str,
    pub body: &'static str,
}

pub struct Link {
    pub label: &'static str,
    pub url: &'static str,
}

pub const REFLECTION_TITLE: &str = "Reflection & Group Work";
pub const REFLECTION_PROMPT: &str =
    "Reflect on sessions you attended. One takeaway + one action this week.";
pub const REFLECTION_STEPS: [&str; 3] = [
    "Share a concise summary with your group.",
    "Pair up and outline an experiment within 7 days.",
    "Note blockers, owners, and a success metric.",
];
pub const REFLECTION_LINKS: [Link; 3] = [
    Link {
        label: "Collab Board 1",
        url: "https://padlet.com/",
    },
    Link {
        label: "Collab Board 2",
        url: "https://padlet.com/",
    },
    Link {
        label: "Submit Outcomes",
        url: "https://forms.gle/",
    },
];

pub const INFO_CARDS: [InfoCard; 3] = [
    InfoCard {
        title: "FAQ",
        body: "Check registration desk for lost & found and speaker changes.",
    },
    InfoCard {
        title: "Wi-Fi",
        body: "SSID: Conf-Guest · Password: welcome2025",
    },
    InfoCard {
        title: "Venue Maps",
        body: "Printed maps at entrances. Digital maps in event app.",
    },
];

/// `9:00 AM – 10:00 AM`, or the raw values when either end does not parse.
pub fn format_time_range(start: &str, end: &str) -> String {
    match (parse_iso(start), parse_iso(end)) {
        (Some(start), Some(end)) => format!(
            "{} – {}",
            start.format("%-I:%M %p"),
            end.format("%-I:%M %p")
        ),
        _ => format!("{start} – {end}"),
    }
}

#[cfg(test)]
#[path = "tests/content_tests.rs"]
mod tests;
