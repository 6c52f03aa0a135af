use chrono::{DateTime, Utc};
use teloxide::utils::markdown::{bold, code_inline, escape};

use crate::event::{JoinEvent, JoinSource};

const UNKNOWN: &str = "Unknown";

/// Notifications carry wall-clock time in the operator's civil time zone,
/// not UTC.
const OPERATOR_TZ: chrono_tz::Tz = chrono_tz::Africa::Lagos;

fn date_and_time(when: &DateTime<Utc>) -> (String, String) {
    let local = when.with_timezone(&OPERATOR_TZ);
    (
        local.format("%B %-d, %Y").to_string(),
        local.format("%I:%M:%S %p").to_string(),
    )
}

pub fn new_member(event: &JoinEvent) -> String {
    let (date, time) = date_and_time(&event.when);

    let heading = match event.source {
        JoinSource::InviteLink => "🎉 New Member Joined (via link)!",
        _ => "🎉 New Member Joined!",
    };

    let username = event
        .joiner
        .username
        .clone()
        .or_else(|| {
            let first = event.joiner.first_name.trim();
            (!first.is_empty()).then(|| first.to_string())
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

    let full_name = event.joiner.full_name();
    let full_name = if full_name.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        full_name
    };

    format!(
        "{}\n\n📆 {} {}\n🕐 {} {}\n👤 {} @{}\n📝 {} {}\n🆔 {} {}\n🏠 {} {}",
        bold(&escape(heading)),
        bold(&escape("Date:")),
        escape(&date),
        bold(&escape("Time:")),
        escape(&time),
        bold(&escape("Username:")),
        escape(&username),
        bold(&escape("Full Name:")),
        escape(&full_name),
        bold(&escape("User ID:")),
        code_inline(&event.joiner.id.to_string()),
        bold(&escape("Group:")),
        escape(&event.group_name),
    )
}

/// Aggregate notice for chats tracked by participant count only: the
/// identities are unknown, only the magnitude of the increase is.
pub fn member_surge(group_name: &str, delta: u32, total: u32, when: &DateTime<Utc>) -> String {
    let (date, time) = date_and_time(when);

    format!(
        "{}\n\n📆 {} {}\n🕐 {} {}\n👥 {} {}\n🧮 {} {}\n🏠 {} {}",
        bold(&escape("📈 New Members Detected!")),
        bold(&escape("Date:")),
        escape(&date),
        bold(&escape("Time:")),
        escape(&time),
        bold(&escape("Joined:")),
        escape(&delta.to_string()),
        bold(&escape("Member Count:")),
        escape(&total.to_string()),
        bold(&escape("Group:")),
        escape(group_name),
    )
}

pub fn monitoring_started(group_name: &str) -> String {
    format!(
        "🤖 You were added to {}\\. Now monitoring it for new members\\.",
        bold(&escape(group_name))
    )
}

pub fn group_list<'a>(entries: impl Iterator<Item = (&'a str, Option<&'a str>)>) -> String {
    let mut body = String::new();
    for (id, name) in entries {
        body += &format!(
            "• {}\n  ID: {}\n\n",
            escape(name.unwrap_or("Unknown Group")),
            code_inline(id)
        );
    }

    if body.is_empty() {
        return no_groups();
    }

    format!("{}\n\n{}", bold(&escape("Monitored Groups:")), body)
}

pub fn no_groups() -> String {
    escape("I'm not monitoring any groups yet. Use 'refresh' to add all groups!")
}

pub fn refresh_started() -> String {
    escape("🔄 Refreshing all groups...")
}

pub fn refresh_done(group_count: usize) -> String {
    escape(&format!(
        "✅ Complete! Now monitoring {group_count} groups."
    ))
}

pub fn copy_info(username: &str, user_id: &str) -> String {
    format!(
        "{}\n\n👤 {} {}\n🆔 {} {}\n\n💡 {}",
        bold(&escape("📋 User Info:")),
        bold(&escape("Username:")),
        code_inline(username),
        bold(&escape("User ID:")),
        code_inline(user_id),
        escape("Tap code blocks to copy"),
    )
}

pub fn copy_usage() -> String {
    format!(
        "Usage: {} \\- display formatted user info",
        code_inline("copy <username> <userId>")
    )
}

pub fn help() -> String {
    format!(
        "{}\n\n\
        • {} \\- show all groups being monitored\n\
        • {} \\- refresh and add all groups\n\
        • {} \\- display formatted user info\n\
        • {} \\- show this help message\n\n\
        {}",
        bold(&escape("Available Commands:")),
        bold("list"),
        bold("refresh"),
        bold(&escape("copy <username> <userId>")),
        bold("help"),
        escape("Note: send these commands to this chat. New-member alerts arrive here for every monitored group."),
    )
}
