//! ANSI escape sequence stripping

/// Where the stripper is inside an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Text,
    Escape,
    Csi,
    Osc,
    OscEscape,
    Charset,
}

/// Removes ANSI escape sequences from decoded text.
///
/// State survives between calls, so a sequence split across two PTY reads is
/// still removed completely.
#[derive(Debug, Default)]
pub struct AnsiStripper {
    state: State,
}

impl AnsiStripper {
    /// Create a stripper in the plain-text state
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip escape sequences from `text`, returning the visible characters.
    pub fn strip(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());

        for ch in text.chars() {
            self.state = match (self.state, ch) {
                (State::Text, '\x1b') => State::Escape,
                (State::Text, c) => {
                    out.push(c);
                    State::Text
                }
                (State::Escape, '[') => State::Csi,
                (State::Escape, ']') => State::Osc,
                (State::Escape, '(' | ')') => State::Charset,
                (State::Escape, _) => State::Text,
                // CSI ends with any final byte in 0x40..=0x7e, not only letters
                (State::Csi, '\x40'..='\x7e') => State::Text,
                (State::Csi, _) => State::Csi,
                // OSC ends with BEL or ST (ESC \)
                (State::Osc, '\x07') => State::Text,
                (State::Osc, '\x1b') => State::OscEscape,
                (State::Osc, _) => State::Osc,
                (State::OscEscape, '\\') => State::Text,
                (State::OscEscape, _) => State::Osc,
                (State::Charset, _) => State::Text,
            };
        }

        out
    }
}

/// Strip ANSI escape sequences from a complete string
pub fn strip_ansi(text: &str) -> String {
    AnsiStripper::new().strip(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_csi() {
        assert_eq!(strip_ansi("Hello \x1b[31mred\x1b[0m world"), "Hello red world");
    }

    #[test]
    fn test_strip_osc() {
        assert_eq!(strip_ansi("Hello \x1b]0;Title\x07 world"), "Hello  world");
        assert_eq!(strip_ansi("a\x1b]2;t\x1b\\b"), "ab");
    }

    #[test]
    fn test_strip_csi_with_symbol_final_byte() {
        assert_eq!(strip_ansi("\x1b[2~ready> "), "ready> ");
        assert_eq!(strip_ansi("\x1b[5~\x1b[3@x\x1b[1`y"), "xy");
    }

    #[test]
    fn test_strip_charset_designator() {
        assert_eq!(strip_ansi("\x1b(Bplain"), "plain");
    }

    #[test]
    fn test_no_ansi() {
        assert_eq!(strip_ansi("Rust user shell\r\n>> "), "Rust user shell\r\n>> ");
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut stripper = AnsiStripper::new();
        let mut out = stripper.strip("ready\x1b[");
        out.push_str(&stripper.strip("1;32"));
        out.push_str(&stripper.strip("m> "));
        assert_eq!(out, "ready> ");
    }
}
