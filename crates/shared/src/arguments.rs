//! Command line argument helpers shared between the binaries.

use std::{num::ParseFloatError, time::Duration};

pub fn duration_from_seconds(s: &str) -> Result<Duration, ParseFloatError> {
    Ok(Duration::from_secs_f64(s.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!(duration_from_seconds("30").unwrap(), Duration::from_secs(30));
        assert_eq!(
            duration_from_seconds("0.5").unwrap(),
            Duration::from_millis(500)
        );
        assert!(duration_from_seconds("abc").is_err());
    }
}
