//! Line sanitizing
//!
//! Decides per source line whether anything is sent and, if so, what.

/// Start of an inline comment
pub const COMMENT_DELIMITER: char = ';';

/// Outcome of sanitizing one source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizedLine<'a> {
    /// Blank or comment-only; counted for progress, never sent
    Skip,
    /// Non-empty command payload
    Command(&'a str),
}

impl<'a> SanitizedLine<'a> {
    /// The payload, if any
    pub fn command(self) -> Option<&'a str> {
        match self {
            SanitizedLine::Skip => None,
            SanitizedLine::Command(payload) => Some(payload),
        }
    }
}

/// Strip whitespace and the inline comment from a raw line
pub fn sanitize(raw: &str) -> SanitizedLine<'_> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with(COMMENT_DELIMITER) {
        return SanitizedLine::Skip;
    }

    let payload = match line.find(COMMENT_DELIMITER) {
        Some(at) => line[..at].trim_end(),
        None => line,
    };
    SanitizedLine::Command(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_skip_lines() {
        assert_eq!(sanitize(""), SanitizedLine::Skip);
        assert_eq!(sanitize("   \t"), SanitizedLine::Skip);
        assert_eq!(sanitize(";LAYER:0"), SanitizedLine::Skip);
        assert_eq!(sanitize("   ; indented comment"), SanitizedLine::Skip);
    }

    #[test]
    fn test_commands() {
        assert_eq!(sanitize("G28"), SanitizedLine::Command("G28"));
        assert_eq!(
            sanitize("  G1 X10 Y5 ; outer wall\r"),
            SanitizedLine::Command("G1 X10 Y5")
        );
        assert_eq!(sanitize("M104 S0;off"), SanitizedLine::Command("M104 S0"));
    }

    proptest! {
        #[test]
        fn prop_payload_is_trimmed_and_comment_free(raw in "[ -~\t]{0,40}") {
            if let SanitizedLine::Command(payload) = sanitize(&raw) {
                prop_assert!(!payload.is_empty());
                prop_assert!(!payload.contains(COMMENT_DELIMITER));
                prop_assert_eq!(payload, payload.trim());
                prop_assert!(raw.contains(payload));
            }
        }

        #[test]
        fn prop_comment_text_never_matters(cmd in "[A-Z][0-9]{1,3}( [A-Z][0-9.]{1,5}){0,3}", comment in "[ -~]{0,20}") {
            let raw = format!("{} ;{}", cmd, comment);
            prop_assert_eq!(sanitize(&raw), SanitizedLine::Command(cmd.as_str()));
        }
    }
}
