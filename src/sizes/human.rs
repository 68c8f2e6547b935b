//! Binary-prefixed byte sizes

const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format `bytes` as `"512 B"`, `"1.5 KiB"`, `"3.2 GiB"` and so on.
pub fn human_size(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0 B")]
    #[test_case(1023, "1023 B")]
    #[test_case(1024, "1.0 KiB")]
    #[test_case(1536, "1.5 KiB")]
    #[test_case(5 * 1024 * 1024, "5.0 MiB")]
    #[test_case(3 * 1024 * 1024 * 1024 + 512 * 1024 * 1024, "3.5 GiB")]
    #[test_case(usize::MAX, "16.0 EiB")]
    fn test_human_size(bytes: usize, expected: &str) {
        assert_eq!(human_size(bytes), expected);
    }
}
