//! Compact status indicator.

/// Indicator shown while presence is live.
pub const INDICATOR_ON: &str = "RP: On";
/// Indicator shown otherwise.
pub const INDICATOR_OFF: &str = "RP: Off";

/// `RP: On` iff both toggles are set and the connection is up.
#[must_use]
pub fn indicator_label(client_enabled: bool, broadcast_enabled: bool, connected: bool) -> &'static str {
    if client_enabled && broadcast_enabled && connected {
        INDICATOR_ON
    } else {
        INDICATOR_OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_requires_everything() {
        assert_eq!(indicator_label(true, true, true), "RP: On");
        assert_eq!(indicator_label(true, true, false), "RP: Off");
        assert_eq!(indicator_label(true, false, true), "RP: Off");
        assert_eq!(indicator_label(false, true, true), "RP: Off");
    }
}
