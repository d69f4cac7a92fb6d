/// Text rendering of the session and the history ledger.
use chrono::{DateTime, Utc};

use clipdrop_shared::models::{DownloadFormat, HistoryEntry};

use crate::lifecycle::{Session, Status};

/// Label of the primary action for the current state.
pub fn action_label(session: &Session) -> String {
    match session.status {
        Status::Idle | Status::Error => "Get Video".to_string(),
        Status::Fetching => "Fetching Video...".to_string(),
        Status::Ready | Status::Complete => format!("Download {}", session.format.title()),
        Status::Downloading => "Downloading...".to_string(),
    }
}

fn progress_bar(progress: f64) -> String {
    const WIDTH: usize = 30;
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        progress
    )
}

/// Progress bar, only while downloading.
pub fn progress_line(session: &Session) -> Option<String> {
    (session.status == Status::Downloading).then(|| progress_bar(session.progress))
}

/// Full screen for one session snapshot.
pub fn render(session: &Session) -> Vec<String> {
    let mut lines = Vec::new();

    if !session.input.is_empty() {
        lines.push(format!("Link: {}", session.input));
    }

    if let Some(info) = &session.info {
        lines.push(String::new());
        lines.push(info.title.clone());
        let mut byline = info.channel_name.clone();
        if let Some(duration) = &info.duration_label {
            byline.push_str(&format!(" | {}", duration));
        }
        if info.from_collection {
            byline.push_str(" | from playlist");
        }
        lines.push(byline);

        lines.push(format!("Format: {}", session.format.title()));
        if session.format == DownloadFormat::Video && !info.quality_options.is_empty() {
            lines.push("Qualities:".to_string());
            let auto_marker = if session.quality.is_none() { "*" } else { " " };
            lines.push(format!("  {} auto", auto_marker));
            for option in &info.quality_options {
                let marker = if session.quality.as_deref() == Some(option.variant_id.as_str()) {
                    "*"
                } else {
                    " "
                };
                lines.push(format!("  {} {} [{}]", marker, option.display_label(), option.variant_id));
            }
        }
    }

    if let Some(line) = progress_line(session) {
        lines.push(line);
    }

    match session.status {
        Status::Error => {
            if let Some(error) = &session.error {
                lines.push(format!("Error: {}", error));
            }
        }
        Status::Complete => match &session.saved_to {
            Some(path) => lines.push(format!("Download complete: {}", path.display())),
            None => lines.push("Download complete".to_string()),
        },
        _ => {}
    }

    lines.push(format!("> {}", action_label(session)));
    lines
}

/// Coarse age of a timestamp relative to `now`.
pub fn relative_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 60 * 24 {
        format!("{}h ago", minutes / 60)
    } else if minutes < 60 * 24 * 7 {
        format!("{}d ago", minutes / (60 * 24))
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

/// Numbered history listing, most recent first.
pub fn render_history(entries: &[HistoryEntry], now: DateTime<Utc>) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No downloads yet".to_string()];
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut line = format!("{:>2}. {} - {}", i + 1, e.title, e.channel_name);
            if let Some(duration) = &e.duration_label {
                line.push_str(&format!(" ({})", duration));
            }
            line.push_str(&format!(" [{}] {}", e.format.title(), relative_age(e.completed_at, now)));
            line
        })
        .collect()
}
