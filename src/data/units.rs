use serde::{Deserialize, Serialize};

/// How a card's values are shown to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// `NN.NN%`
    Percent,
    /// Bytes, binary units.
    Memory,
    /// Bytes per second of network traffic.
    Traffic,
    /// Bytes per second of disk I/O.
    Disk,
    /// The number as is, two decimals at most.
    #[default]
    Plain,
}

const BYTE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

impl ValueFormat {
    /// Format a value for display.
    pub fn format(&self, y: f64) -> String {
        match self {
            ValueFormat::Percent => format!("{:.2}%", y),
            ValueFormat::Memory => format_bytes(y),
            ValueFormat::Traffic | ValueFormat::Disk => format!("{}/s", format_bytes(y)),
            ValueFormat::Plain => format_plain(y),
        }
    }
}

/// Format a byte count with base-1024 units.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() {
        return format!("{bytes}");
    }
    let mut value = bytes;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, BYTE_UNITS[unit])
    } else {
        format!("{:.2} {}", value, BYTE_UNITS[unit])
    }
}

fn format_plain(y: f64) -> String {
    if y.fract() == 0.0 {
        format!("{:.0}", y)
    } else {
        format!("{:.2}", y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(ValueFormat::Percent.format(34.56), "34.56%");
        assert_eq!(ValueFormat::Percent.format(0.0), "0.00%");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1536.0), "1.50 KB");
        assert_eq!(format_bytes(2.0 * 1024.0 * 1024.0 * 1024.0), "2.00 GB");
    }

    #[test]
    fn test_rates() {
        assert_eq!(ValueFormat::Traffic.format(2048.0), "2.00 KB/s");
        assert_eq!(ValueFormat::Disk.format(10.0), "10 B/s");
    }

    #[test]
    fn test_plain() {
        assert_eq!(ValueFormat::Plain.format(42.0), "42");
        assert_eq!(ValueFormat::Plain.format(3.14159), "3.14");
    }
}
