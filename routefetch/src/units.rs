//! Human-readable byte figures.
//!
//! Progress lines and space warnings report kilobytes with thousands
//! separators (`1,024,000 kB`); the info summary reports gigabytes with two
//! decimals.

const KIB: u64 = 1024;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Group the digits of `value` in threes with `,` separators.
///
/// # Examples
///
/// ```
/// use routefetch::units::group_thousands;
///
/// assert_eq!(group_thousands(0), "0");
/// assert_eq!(group_thousands(999), "999");
/// assert_eq!(group_thousands(1_048_576), "1,048,576");
/// ```
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

/// Whole kilobytes in `bytes`, rounded down.
pub fn to_kb(bytes: u64) -> u64 {
    bytes / KIB
}

/// Format a byte count as kilobytes, e.g. `"1,024 kB"`.
pub fn format_kb(bytes: u64) -> String {
    format!("{} kB", group_thousands(to_kb(bytes)))
}

/// Format a byte count as gigabytes with two decimals, e.g. `"1.50 GB"`.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}
