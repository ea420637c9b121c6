//! Human readable durations

/// `12.3s`, `4m 5s`, `1h 2m`; `∞` when unbounded
pub fn fmt_seconds(secs: f64) -> String {
    if secs.is_nan() {
        return "--".to_string();
    }
    if secs.is_infinite() {
        return "∞".to_string();
    }
    let secs = secs.max(0.0);
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }
    let minutes = (secs / 60.0).floor() as u64;
    let rest = secs - minutes as f64 * 60.0;
    if minutes < 60 {
        return format!("{}m {:.0}s", minutes, rest);
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// `HH:MM:SS`, capped at `99:59:59`; `∞` when unbounded
pub fn fmt_hhmmss(secs: f64) -> String {
    if secs.is_nan() {
        return "--:--:--".to_string();
    }
    if secs.is_infinite() {
        return "∞".to_string();
    }
    let total = (secs.max(0.0).round() as u64).min(99 * 3600 + 59 * 60 + 59);
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_seconds() {
        assert_eq!(fmt_seconds(0.0), "0.0s");
        assert_eq!(fmt_seconds(12.34), "12.3s");
        assert_eq!(fmt_seconds(-5.0), "0.0s");
        assert_eq!(fmt_seconds(245.0), "4m 5s");
        assert_eq!(fmt_seconds(3720.0), "1h 2m");
        assert_eq!(fmt_seconds(f64::INFINITY), "∞");
        assert_eq!(fmt_seconds(f64::NAN), "--");
    }

    #[test]
    fn test_fmt_hhmmss() {
        assert_eq!(fmt_hhmmss(0.0), "00:00:00");
        assert_eq!(fmt_hhmmss(3723.4), "01:02:03");
        assert_eq!(fmt_hhmmss(1_000_000.0), "99:59:59");
        assert_eq!(fmt_hhmmss(f64::INFINITY), "∞");
    }
}
