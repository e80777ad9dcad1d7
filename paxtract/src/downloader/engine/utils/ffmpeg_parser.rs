//! FFmpeg stderr parsing for remux progress.

/// Parse time string in HH:MM:SS.ms format to seconds.
///
/// ```ignore
/// assert_eq!(parse_time("00:00:10.50"), Some(10.5));
/// assert_eq!(parse_time("invalid"), None);
/// ```
pub fn parse_time(time_str: &str) -> Option<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: f64 = parts[0].trim().parse().ok()?;
    let minutes: f64 = parts[1].trim().parse().ok()?;
    let seconds: f64 = parts[2].trim().parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse the input duration from a banner line such as
/// `  Duration: 00:23:40.02, start: 0.000000, bitrate: N/A`.
pub fn parse_duration(line: &str) -> Option<f64> {
    let start = line.find("Duration:")?;
    let rest = line[start + "Duration:".len()..].trim_start();
    let end = rest.find(',').unwrap_or(rest.len());
    parse_time(&rest[..end])
}

/// Parse the `time=` field of a progress line (e.g. `time=00:01:30.50`).
pub fn parse_time_field(line: &str) -> Option<f64> {
    let time_start = line.find("time=")?;
    let time_str = &line[time_start + 5..];
    let end = time_str.find(' ').unwrap_or(time_str.len());
    parse_time(&time_str[..end])
}

/// Fraction of `duration` covered by `elapsed`, clamped to `[0, 1]`.
///
/// An unknown or zero duration yields `None`.
pub fn progress_fraction(elapsed: f64, duration: Option<f64>) -> Option<f64> {
    let duration = duration.filter(|d| *d > 0.0)?;
    Some((elapsed / duration).clamp(0.0, 1.0))
}
