use crate::ui::{Icons, Tone, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::PHONE, text.style(theme().style(Tone::Header)));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().style(Tone::Dim)), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().style(Tone::Success)));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().style(Tone::Error)));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().style(Tone::Warn)));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().style(Tone::Info)),
        label.style(theme().style(Tone::Dim)),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().style(Tone::Header)));
}

/// One `key = value` line of a listing
pub fn key_value(key: &str, value: &str) {
    println!("  {} = {}", key.style(theme().style(Tone::Key)), value);
}

pub fn dim(text: &str) -> String {
    text.style(theme().style(Tone::Dim)).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().style(Tone::Muted)).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().style(Tone::Dim)), value);
}

/// `1536` -> `"1.5 KB"`
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1023), "1023 B");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(500 * 1024 * 1024), "500.0 MB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024 * 1024), "3072.0 GB");
    }
}
