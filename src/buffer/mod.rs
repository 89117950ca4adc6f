//! Buffering of decoded process output

mod ansi;
mod decode;

pub use ansi::{strip_ansi, AnsiStripper};
pub use decode::{Decoder, Encoding};

/// Ratio for buffer compaction strategy.
/// When the buffer is full, keep the newest 2/3 of `max_size` where possible.
const DISCARD_RATIO: usize = 3;

/// Accumulates decoded output and tracks how much of it has been scanned.
///
/// Offsets handed in and out of the buffer are absolute stream offsets (bytes
/// of decoded text since the session started), so they stay valid across
/// compaction. The scan cursor only ever moves forward, and compaction never
/// drops text at or after the cursor.
#[derive(Debug)]
pub struct StreamBuffer {
    text: String,
    cursor: usize,
    discarded: usize,
    max_size: usize,
    stripper: Option<AnsiStripper>,
}

impl StreamBuffer {
    /// Create a buffer that compacts scanned text beyond `max_size` bytes
    pub fn new(max_size: usize, strip_ansi: bool) -> Self {
        Self {
            text: String::with_capacity(max_size.min(64 * 1024)),
            cursor: 0,
            discarded: 0,
            max_size,
            stripper: strip_ansi.then(AnsiStripper::new),
        }
    }

    /// Append text to the tail
    pub fn append(&mut self, text: &str) {
        match self.stripper.as_mut() {
            Some(stripper) => {
                let visible = stripper.strip(text);
                self.text.push_str(&visible);
            }
            None => self.text.push_str(text),
        }

        if self.text.len() > self.max_size {
            self.compact();
        }
    }

    /// Text from the scan cursor to the tail
    pub fn unscanned(&self) -> &str {
        &self.text[self.cursor..]
    }

    /// Move the scan cursor to absolute offset `to`.
    ///
    /// Clamped so the cursor never moves backward or past the tail.
    pub fn advance_cursor(&mut self, to: usize) {
        let mut relative = to.saturating_sub(self.discarded).min(self.text.len());
        while !self.text.is_char_boundary(relative) {
            relative -= 1;
        }
        self.cursor = self.cursor.max(relative);
    }

    /// Absolute offset of the scan cursor
    pub fn scanned_position(&self) -> usize {
        self.discarded + self.cursor
    }

    /// Absolute offset of the tail (total text seen so far)
    pub fn end_position(&self) -> usize {
        self.discarded + self.text.len()
    }

    /// Text between two absolute offsets, if still retained
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        let start = start.checked_sub(self.discarded)?;
        let end = end.checked_sub(self.discarded)?;
        self.text.get(start..end)
    }

    /// Retained text, scanned and unscanned
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of retained bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Drop already scanned text beyond the size limit
    fn compact(&mut self) {
        let keep = self.max_size - self.max_size / DISCARD_RATIO;
        let mut keep_from = self.text.len().saturating_sub(keep).min(self.cursor);
        while !self.text.is_char_boundary(keep_from) {
            keep_from -= 1;
        }

        if keep_from > 0 {
            self.text.drain(..keep_from);
            self.cursor -= keep_from;
            self.discarded += keep_from;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_buffer() {
        let buffer = StreamBuffer::new(1024, false);
        assert!(buffer.is_empty());
        assert_eq!(buffer.scanned_position(), 0);
        assert_eq!(buffer.unscanned(), "");
    }

    #[test]
    fn test_multiple_appends() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("Hello ");
        buffer.append("World");
        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.unscanned(), "Hello World");
    }

    #[test]
    fn test_advance_cursor() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("Hello World");
        buffer.advance_cursor(6);

        assert_eq!(buffer.unscanned(), "World");
        assert_eq!(buffer.scanned_position(), 6);
    }

    #[test]
    fn test_cursor_never_moves_backward() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("Test data");

        buffer.advance_cursor(5);
        buffer.advance_cursor(2);
        assert_eq!(buffer.scanned_position(), 5);
        assert_eq!(buffer.unscanned(), "data");
    }

    #[test]
    fn test_cursor_clamped_to_tail() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("abc");
        buffer.advance_cursor(100);

        assert_eq!(buffer.scanned_position(), 3);
        assert_eq!(buffer.unscanned(), "");

        buffer.append("def");
        assert_eq!(buffer.unscanned(), "def");
    }

    #[test]
    fn test_cursor_snaps_to_char_boundary() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("a世b");
        buffer.advance_cursor(2);
        assert_eq!(buffer.unscanned(), "世b");
    }

    #[test]
    fn test_compact_discards_only_scanned_text() {
        let mut buffer = StreamBuffer::new(90, false);
        buffer.append(&"0123456789".repeat(5));
        buffer.advance_cursor(20);

        buffer.append(&"X".repeat(50));

        // 20 scanned bytes were eligible; everything unscanned survives
        assert_eq!(buffer.scanned_position(), 20);
        assert_eq!(buffer.unscanned().len(), 80);
        assert!(buffer.unscanned().starts_with("0123456789"));
        assert!(buffer.len() < 100);
    }

    #[test]
    fn test_compact_never_drops_unscanned() {
        let mut buffer = StreamBuffer::new(30, false);
        buffer.append(&"A".repeat(100));

        // Nothing scanned, so nothing can be discarded
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.unscanned().len(), 100);
    }

    #[test]
    fn test_compact_keeps_absolute_offsets() {
        let mut buffer = StreamBuffer::new(30, false);
        buffer.append(&"a".repeat(40));
        buffer.advance_cursor(40);
        buffer.append("needle");

        assert!(buffer.len() < 46);
        assert_eq!(buffer.end_position(), 46);
        assert_eq!(buffer.slice(40, 46), Some("needle"));
        assert_eq!(buffer.slice(0, 5), None);
    }

    #[test]
    fn test_strip_ansi_enabled() {
        let mut buffer = StreamBuffer::new(1024, true);
        buffer.append("Hello \x1b[31mRed\x1b[0m World");
        assert_eq!(buffer.as_str(), "Hello Red World");
    }

    #[test]
    fn test_strip_ansi_disabled() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("Hello \x1b[31mRed\x1b[0m World");
        assert_eq!(buffer.as_str(), "Hello \x1b[31mRed\x1b[0m World");
    }

    #[test]
    fn test_empty_append() {
        let mut buffer = StreamBuffer::new(1024, false);
        buffer.append("");
        assert!(buffer.is_empty());
    }

    proptest! {
        #[test]
        fn prop_unscanned_is_concatenation(chunks in prop::collection::vec(".{0,16}", 0..20)) {
            let mut buffer = StreamBuffer::new(1 << 20, false);
            for chunk in &chunks {
                buffer.append(chunk);
            }
            prop_assert_eq!(buffer.unscanned(), chunks.concat());
        }

        #[test]
        fn prop_cursor_is_monotonic(
            text in "[a-z]{0,64}",
            moves in prop::collection::vec(0usize..80, 0..20),
        ) {
            let mut buffer = StreamBuffer::new(1 << 20, false);
            buffer.append(&text);
            let mut last = 0;
            for to in moves {
                buffer.advance_cursor(to);
                prop_assert!(buffer.scanned_position() >= last);
                prop_assert!(buffer.scanned_position() <= text.len());
                last = buffer.scanned_position();
            }
        }
    }
}
