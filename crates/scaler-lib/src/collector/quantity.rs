//! Kubernetes resource quantity parsing for metrics API values

/// Parse a CPU quantity (`"250m"`, `"1"`, `"1.5"`, `"123456789n"`) into millicores
///
/// Unparseable values count as zero.
pub fn parse_cpu_millicores(value: &str) -> u64 {
    let value = value.trim();

    let (number, scale) = if let Some(n) = value.strip_suffix('n') {
        (n, 1e-6)
    } else if let Some(n) = value.strip_suffix('u') {
        (n, 1e-3)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 1.0)
    } else {
        (value, 1000.0)
    };

    number
        .parse::<f64>()
        .map(|n| (n * scale).round().max(0.0) as u64)
        .unwrap_or(0)
}

/// Parse a memory quantity (`"128974848"`, `"129Mi"`, `"125000Ki"`, `"1G"`) into MiB
///
/// Unparseable values count as zero.
pub fn parse_memory_mib(value: &str) -> u64 {
    const MIB: f64 = 1024.0 * 1024.0;
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", MIB),
        ("Gi", MIB * 1024.0),
        ("Ti", MIB * 1024.0 * 1024.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
    ];

    let value = value.trim();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| value.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((value, 1.0));

    number
        .parse::<f64>()
        .map(|n| (n * multiplier / MIB).round().max(0.0) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_units() {
        assert_eq!(parse_cpu_millicores("250m"), 250);
        assert_eq!(parse_cpu_millicores("2"), 2000);
        assert_eq!(parse_cpu_millicores("0.5"), 500);
        assert_eq!(parse_cpu_millicores("123456789n"), 123);
        assert_eq!(parse_cpu_millicores("2000u"), 2);
    }

    #[test]
    fn test_parse_cpu_garbage_is_zero() {
        assert_eq!(parse_cpu_millicores(""), 0);
        assert_eq!(parse_cpu_millicores("lots"), 0);
    }

    #[test]
    fn test_parse_memory_units() {
        assert_eq!(parse_memory_mib("128Mi"), 128);
        assert_eq!(parse_memory_mib("131072Ki"), 128);
        assert_eq!(parse_memory_mib("1Gi"), 1024);
        assert_eq!(parse_memory_mib("134217728"), 128);
        assert_eq!(parse_memory_mib("nothing"), 0);
    }
}
