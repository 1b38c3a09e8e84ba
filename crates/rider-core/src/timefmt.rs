/// Placeholder shown while the duration is unknown.
pub const UNKNOWN_CLOCK: &str = "--:--";

/// `m:ss`-style clock: `03:07`, or `1:02:03` past the hour.
pub fn clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

pub fn duration_label(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s > 0.0 => clock(s),
        _ => UNKNOWN_CLOCK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock() {
        assert_eq!(clock(0.0), "00:00");
        assert_eq!(clock(187.9), "03:07");
        assert_eq!(clock(3723.0), "1:02:03");
        assert_eq!(clock(-5.0), "00:00");
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label(None), UNKNOWN_CLOCK);
        assert_eq!(duration_label(Some(0.0)), UNKNOWN_CLOCK);
        assert_eq!(duration_label(Some(61.0)), "01:01");
    }
}
