//! Matroska chapter timestamp parsing and formatting (nanoseconds).

/// Parse `HH:MM:SS.fffffffff` to nanoseconds. Missing fractions read as 0.
pub fn parse_ns(text: &str) -> Option<i64> {
    let mut parts = text.trim().splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    let (seconds_str, frac_str) = match rest.split_once('.') {
        Some((s, f)) => (s, f),
        None => (rest, ""),
    };
    let seconds: i64 = seconds_str.parse().ok()?;
    let frac_padded: String = format!("{:0<9}", frac_str)
        .chars()
        .take(9)
        .collect();
    let frac: i64 = if frac_padded.is_empty() {
        0
    } else {
        frac_padded.parse().ok()?
    };
    Some((hours * 3600 + minutes * 60 + seconds) * 1_000_000_000 + frac)
}

/// Format nanoseconds as `HH:MM:SS.fffffffff`. Negative values clamp to 0.
pub fn format_ns(ns: i64) -> String {
    let ns = ns.max(0);
    let frac = ns % 1_000_000_000;
    let total_s = ns / 1_000_000_000;
    let hours = total_s / 3600;
    let minutes = (total_s % 3600) / 60;
    let seconds = total_s % 60;
    format!("{:02}:{:02}:{:02}.{:09}", hours, minutes, seconds, frac)
}

/// Unit-adaptive signed delta for logs: ns under 1 µs, µs under 1 ms, else
/// ms.
pub fn format_delta(delta_ns: i64) -> String {
    let abs = delta_ns.unsigned_abs();
    let sign = if delta_ns >= 0 { "+" } else { "-" };
    if delta_ns == 0 {
        "0ns".to_string()
    } else if abs < 1_000 {
        format!("{}{}ns", sign, abs)
    } else if abs < 1_000_000 {
        format!("{}{:.3}us", sign, abs as f64 / 1_000.0)
    } else {
        format!("{}{:.3}ms", sign, abs as f64 / 1_000_000.0)
    }
}
