/// Formats a byte count for display ("1.5 MB", "640 Bytes").
///
/// Uses decimal units, same as most chat clients show file sizes.
///
/// # Example
///
/// ```
/// use vidrelay::core::utils::format_size;
///
/// assert_eq!(format_size(1_500_000.0), "1.5 MB");
/// assert_eq!(format_size(640.0), "640 Bytes");
/// ```
pub fn format_size(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];
    if !bytes.is_finite() || bytes < 1000.0 {
        return format!("{} Bytes", bytes.max(0.0) as u64);
    }
    let mut value = bytes;
    let mut unit = UNITS[0];
    for u in UNITS {
        value /= 1000.0;
        unit = u;
        if value < 1000.0 {
            break;
        }
    }
    format!("{:.1} {}", value, unit)
}

/// Formats a transfer rate in bytes per second.
pub fn format_speed(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed > 0.0 => format!("{}/s", format_size(speed)),
        _ => "N/A".to_string(),
    }
}
