//! Text helpers shared by handlers and transports.

use unicode_segmentation::UnicodeSegmentation;

/// Maximum number of characters the platform accepts in one text message.
pub const MESSAGE_LIMIT: usize = 2000;

/// Splits a long message into parts of at most `max_chars` characters.
///
/// Lines are kept together where possible; a single line longer than the
/// limit is cut on grapheme boundaries so emoji and combined characters
/// are never torn apart.
///
/// # Examples
///
/// ```
/// use pagebot_core::utils::split_long_message;
/// let long_msg = "A fairly long line of text\n".repeat(200);
/// let parts = split_long_message(&long_msg, 2000);
/// assert!(parts.len() > 1);
/// assert!(parts.iter().all(|p| p.chars().count() <= 2000));
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_chars: usize) -> Vec<String> {
    if message.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.lines() {
        let line_len = line.chars().count();

        if line_len > max_chars {
            if !current.is_empty() {
                parts.push(current.trim_end().to_string());
                current.clear();
                current_len = 0;
            }
            let mut chunk = String::new();
            let mut chunk_len = 0;
            for grapheme in line.graphemes(true) {
                // A cluster wider than the limit is cut on chars.
                let pieces: Vec<String> = if grapheme.chars().count() > max_chars {
                    grapheme.chars().map(String::from).collect()
                } else {
                    vec![grapheme.to_string()]
                };
                for piece in pieces {
                    let piece_len = piece.chars().count();
                    if chunk_len + piece_len > max_chars && !chunk.is_empty() {
                        parts.push(std::mem::take(&mut chunk));
                        chunk_len = 0;
                    }
                    chunk.push_str(&piece);
                    chunk_len += piece_len;
                }
            }
            if !chunk.is_empty() {
                current = chunk;
                current.push('\n');
                current_len = chunk_len + 1;
            }
            continue;
        }

        // +1 for the newline
        if current_len + line_len + 1 > max_chars && !current.is_empty() {
            parts.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len + 1;
    }

    if !current.trim_end().is_empty() {
        parts.push(current.trim_end().to_string());
    }

    parts
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use pagebot_core::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Formats a duration in seconds as `1d 2h 3m 4s`, skipping leading zero units.
#[must_use]
pub fn format_uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
