// Duration parsing for call lengths and relative callback times

use anyhow::Result;

/// Parse a duration such as `30s`, `10m`, `2h`, `1h30m` or `1d` into seconds.
/// A bare number is taken as seconds.
pub fn parse_duration(expr: &str) -> Result<i64> {
    let expr = expr.trim();
    if expr.is_empty() {
        anyhow::bail!("Invalid duration format: empty");
    }
    if let Ok(secs) = expr.parse::<i64>() {
        if secs < 0 {
            anyhow::bail!("Duration cannot be negative: {}", expr);
        }
        return Ok(secs);
    }

    let mut total_secs = 0i64;
    let mut digits = String::new();
    for c in expr.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'd' => 86400,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => anyhow::bail!("Invalid duration format: {}", expr),
        };
        let value: i64 = digits
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration format: {}", expr))?;
        total_secs = value
            .checked_mul(unit)
            .and_then(|secs| total_secs.checked_add(secs))
            .ok_or_else(|| anyhow::anyhow!("Duration too large: {}", expr))?;
        digits.clear();
    }
    if !digits.is_empty() {
        anyhow::bail!("Invalid duration format: {} (missing unit after {})", expr, digits);
    }

    Ok(total_secs)
}

/// Render seconds compactly: `1h5m`, `3m20s`, `45s`
pub fn format_duration_short(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 && seconds > 0 {
        format!("{}m{}s", minutes, seconds)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), 30);
        assert_eq!(parse_duration("10m").unwrap(), 600);
        assert_eq!(parse_duration("2h").unwrap(), 7200);
        assert_eq!(parse_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_duration("1d").unwrap(), 86400);
        assert_eq!(parse_duration("95").unwrap(), 95);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10").is_ok());
        assert!(parse_duration("1h30").is_err());
        assert!(parse_duration("2w").is_err());
        assert!(parse_duration("-5").is_err());
    }

    #[test]
    fn test_parse_duration_too_large() {
        let err = parse_duration("999999999999999d").unwrap_err();
        assert!(err.to_string().contains("Duration too large"));
        assert!(parse_duration("99999999999999999999s").is_err());
        assert!(parse_duration("106751991167300d1d").is_err());
    }

    #[test]
    fn test_format_duration_short() {
        assert_eq!(format_duration_short(45), "45s");
        assert_eq!(format_duration_short(200), "3m20s");
        assert_eq!(format_duration_short(120), "2m");
        assert_eq!(format_duration_short(3900), "1h5m");
    }
}
