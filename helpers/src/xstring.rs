//! Growable Strings (XString)
//!
//! Counted, heap-backed byte strings that track both the current length and
//! the allocated capacity, and keep a terminating null byte for interop with
//! C-style text.
//!
//! # Invariants
//!
//! - `capacity == 0` exactly when no buffer is allocated
//! - When a buffer exists, `length < capacity` and `buffer[length] == 0`
//! - Growth is exact: the buffer is resized to precisely what is needed
//!
//! # Usage
//! ```ignore
//! let mut s = XString::from_copy(b"This is a test string.", 0);
//! s.splice(10, 4, b"stupid");
//! assert_eq!(s.as_bytes(), b"This is a stupid string.");
//! ```
//!
//! Strings are single-owner values; there is no implicit copy. Use
//! [`XString::copy_from`] to duplicate one.

use alloc::vec::Vec;
use core::fmt;

/// Line ending style for [`XString::convert_line_endings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// `\n`
    Unix,
    /// `\r\n`
    Dos,
}

/// Bad-character shift table for repeated substring searches
///
/// Built from a search pattern (Boyer-Moore-Horspool) and reusable across
/// calls to [`XString::find_replace`] with the same pattern.
pub struct ShiftTable {
    shifts: [usize; 256],
    /// Pattern the shifts were built for
    pattern: Vec<u8>,
    valid: bool,
}

impl ShiftTable {
    /// Create an empty table; it is filled on first use
    pub const fn new() -> Self {
        Self {
            shifts: [0; 256],
            pattern: Vec::new(),
            valid: false,
        }
    }

    /// Check if the table was built for exactly this pattern
    fn is_prepared_for(&self, pattern: &[u8]) -> bool {
        self.valid && self.pattern == pattern
    }

    /// Build the shifts for `pattern` (must not be empty)
    fn prepare(&mut self, pattern: &[u8]) {
        let m = pattern.len();
        self.shifts = [m; 256];
        for (i, &b) in pattern[..m - 1].iter().enumerate() {
            self.shifts[b as usize] = m - 1 - i;
        }
        self.pattern.clear();
        self.pattern.extend_from_slice(pattern);
        self.valid = true;
    }

    /// Find the first occurrence of `pattern` in `haystack`
    fn find(&self, haystack: &[u8], pattern: &[u8]) -> Option<usize> {
        let m = pattern.len();
        let n = haystack.len();
        if m == 0 || m > n {
            return None;
        }

        let last = m - 1;
        let mut pos = 0;
        while pos + m <= n {
            let tail = haystack[pos + last];
            if tail == pattern[last] && haystack[pos..pos + last] == pattern[..last] {
                return Some(pos);
            }
            pos += self.shifts[tail as usize];
        }

        None
    }
}

impl Default for ShiftTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShiftTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShiftTable")
            .field("pattern_len", &self.pattern.len())
            .field("valid", &self.valid)
            .finish()
    }
}

/// Plain forward substring search
fn memfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Growable, null-terminated byte string
pub struct XString {
    /// Allocated bytes; `buf.len()` is the capacity
    buf: Vec<u8>,
    /// Bytes in use, excluding the terminator
    length: usize,
}

impl XString {
    /// Create an empty string without allocating
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            length: 0,
        }
    }

    /// Create an empty string with `preallocate` bytes reserved
    pub fn with_capacity(preallocate: usize) -> Self {
        let mut s = Self::new();
        s.reserve(preallocate);
        s
    }

    /// Adopt an existing heap buffer without copying its content
    ///
    /// The string ends at the first null byte (or the end of the buffer, in
    /// which case a terminator is added). Capacity is `length + 1`.
    pub fn from_heap(mut buffer: Vec<u8>) -> Self {
        let length = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        if length == buffer.len() {
            buffer.push(0);
        }
        buffer.truncate(length + 1);

        Self { buf: buffer, length }
    }

    /// Create a copy of `source` with `extra_reserve` spare bytes
    pub fn from_copy(source: &[u8], extra_reserve: usize) -> Self {
        let mut buf = Vec::with_capacity(source.len() + 1 + extra_reserve);
        buf.extend_from_slice(source);
        buf.resize(source.len() + 1 + extra_reserve, 0);

        Self {
            buf,
            length: source.len(),
        }
    }

    /// Release the buffer and return to the empty state
    pub fn clear(&mut self) {
        self.buf = Vec::new();
        self.length = 0;
    }

    /// Current length in bytes (not counting the terminator)
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if the string is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Allocated bytes, including room for the terminator
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Get the string content as a slice
    pub fn as_bytes(&self) -> &[u8] {
        if self.buf.is_empty() {
            &[]
        } else {
            &self.buf[..self.length]
        }
    }

    /// Get the content including the terminating null byte
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        if self.buf.is_empty() {
            b"\0"
        } else {
            &self.buf[..=self.length]
        }
    }

    /// Get the content as `&str` if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_bytes()).ok()
    }

    /// Take the content out as a vector (no terminator)
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buf.truncate(self.length);
        self.buf
    }

    /// Make sure at least `min_bytes` are allocated
    ///
    /// Grows to exactly `min_bytes` and never shrinks. Returns the capacity.
    pub fn reserve(&mut self, min_bytes: usize) -> usize {
        if self.buf.len() < min_bytes {
            log::trace!("xstring: growing buffer {} -> {} bytes", self.buf.len(), min_bytes);
            self.buf.reserve_exact(min_bytes - self.buf.len());
            self.buf.resize(min_bytes, 0);
        }
        self.buf.len()
    }

    /// Replace the content with `source`
    ///
    /// Existing capacity is reused when sufficient. An empty source truncates
    /// to empty but keeps the allocation. Returns the new length.
    pub fn assign(&mut self, source: &[u8]) -> usize {
        if source.is_empty() {
            if !self.buf.is_empty() {
                self.buf[0] = 0;
            }
            self.length = 0;
            return 0;
        }

        let needed = source.len() + 1;
        if needed > self.buf.len() {
            let mut buf = Vec::with_capacity(needed);
            buf.extend_from_slice(source);
            buf.push(0);
            self.buf = buf;
        } else {
            self.buf[..source.len()].copy_from_slice(source);
            self.buf[source.len()] = 0;
        }

        self.length = source.len();
        self.length
    }

    /// Replace the content with a copy of another string
    pub fn copy_from(&mut self, other: &XString) -> usize {
        self.assign(other.as_bytes())
    }

    /// Append `source`
    ///
    /// Returns the new length, or 0 if there was nothing to append.
    pub fn append(&mut self, source: &[u8]) -> usize {
        if source.is_empty() {
            return 0;
        }

        let new_length = self.length + source.len();
        self.reserve(new_length + 1);
        self.buf[self.length..new_length].copy_from_slice(source);
        self.buf[new_length] = 0;
        self.length = new_length;
        new_length
    }

    /// Append a single byte; appending the null byte does nothing
    pub fn append_char(&mut self, c: u8) -> usize {
        if c == 0 {
            return 0;
        }

        self.reserve(self.length + 2);
        self.buf[self.length] = c;
        self.length += 1;
        self.buf[self.length] = 0;
        self.length
    }

    /// Append another growable string
    pub fn append_xstring(&mut self, other: &XString) -> usize {
        self.append(other.as_bytes())
    }

    /// Replace `replace_len` bytes at `first` with `replacement`
    ///
    /// `first + replace_len` must not exceed the length; otherwise nothing
    /// happens and 0 is returned. A zero-length span inserts, an empty
    /// replacement deletes. Returns the new length.
    pub fn splice(&mut self, first: usize, replace_len: usize, replacement: &[u8]) -> usize {
        let span_end = match first.checked_add(replace_len) {
            Some(end) if end <= self.length => end,
            _ => return 0,
        };

        let tail_len = self.length - span_end;
        let new_length = self.length - replace_len + replacement.len();
        if new_length == 0 && self.buf.is_empty() {
            return 0;
        }

        let needed = new_length + 1;
        if needed > self.buf.len() {
            // Build the new buffer from head, replacement and tail
            log::trace!("xstring: splice reallocates {} -> {} bytes", self.buf.len(), needed);
            let mut buf = Vec::with_capacity(needed);
            buf.extend_from_slice(&self.buf[..first]);
            buf.extend_from_slice(replacement);
            buf.extend_from_slice(&self.buf[span_end..self.length]);
            buf.push(0);
            self.buf = buf;
        } else {
            // Move the tail first; source and destination may overlap
            let tail_dest = first + replacement.len();
            self.buf.copy_within(span_end..span_end + tail_len, tail_dest);
            self.buf[first..tail_dest].copy_from_slice(replacement);
            self.buf[new_length] = 0;
        }

        self.length = new_length;
        new_length
    }

    /// Replace the next occurrence of `search` at or after `*offset`
    ///
    /// On success `*offset` moves past the replacement, so calling again with
    /// the same arguments replaces the following occurrence. With `repeat`
    /// set, `shift` is reused as built by the previous call for the same
    /// pattern. Returns the new length, or 0 if `search` was not found.
    pub fn find_replace(
        &mut self,
        offset: &mut usize,
        search: &[u8],
        replace: &[u8],
        shift: &mut ShiftTable,
        repeat: bool,
    ) -> usize {
        self.replace_next(offset, search, replace, shift, repeat)
            .unwrap_or(0)
    }

    fn replace_next(
        &mut self,
        offset: &mut usize,
        search: &[u8],
        replace: &[u8],
        shift: &mut ShiftTable,
        repeat: bool,
    ) -> Option<usize> {
        if search.is_empty() || *offset > self.length {
            return None;
        }

        if !repeat || !shift.is_prepared_for(search) {
            shift.prepare(search);
        }

        let found = shift.find(&self.as_bytes()[*offset..], search)?;
        let pos = *offset + found;
        let new_length = self.splice(pos, search.len(), replace);
        *offset = pos + replace.len();

        Some(new_length)
    }

    /// Replace every non-overlapping occurrence of `search`, left to right
    ///
    /// Returns the number of replacements made.
    pub fn find_replace_all(&mut self, search: &[u8], replace: &[u8]) -> usize {
        let mut shift = ShiftTable::new();
        let mut offset = 0;
        let mut count = 0;

        while self
            .replace_next(&mut offset, search, replace, &mut shift, count > 0)
            .is_some()
        {
            count += 1;
        }

        count
    }

    /// Convert all line endings to the given style
    ///
    /// Returns the number of line endings rewritten.
    pub fn convert_line_endings(&mut self, format: LineFormat) -> usize {
        match format {
            LineFormat::Unix => self.find_replace_all(b"\r\n", b"\n"),
            LineFormat::Dos => self.find_replace_all(b"\n", b"\r\n"),
        }
    }

    /// Find `word` where it stands alone
    ///
    /// A match counts only if the byte before it is the start of the string
    /// or one of `before_chars`, and the byte after it is the end of the
    /// string or one of `after_chars`.
    pub fn find_word(
        &self,
        word: &[u8],
        start: usize,
        before_chars: &[u8],
        after_chars: &[u8],
    ) -> Option<usize> {
        let text = self.as_bytes();
        let mut from = start;

        while from <= text.len() {
            let pos = from + memfind(&text[from..], word)?;
            let end = pos + word.len();

            let delimited_before = pos == 0 || before_chars.contains(&text[pos - 1]);
            let delimited_after = end == text.len() || after_chars.contains(&text[end]);
            if delimited_before && delimited_after {
                return Some(pos);
            }

            from = pos + 1;
        }

        None
    }

    /// Replace every byte listed in `chars` with a `%xx` escape
    ///
    /// Returns the number of bytes escaped.
    pub fn encode(&mut self, chars: &[u8]) -> usize {
        let count = self.as_bytes().iter().filter(|b| chars.contains(b)).count();
        if count == 0 {
            return 0;
        }

        let mut out = Vec::with_capacity(self.length + count * 2);
        for &b in self.as_bytes() {
            if chars.contains(&b) {
                out.push(b'%');
                out.push(HEX_DIGITS[(b >> 4) as usize]);
                out.push(HEX_DIGITS[(b & 0x0f) as usize]);
            } else {
                out.push(b);
            }
        }

        self.assign(&out);
        count
    }

    /// Turn `%xx` escapes back into bytes
    ///
    /// `%00` and malformed escapes are left alone. Returns the number of
    /// escapes decoded.
    pub fn decode(&mut self) -> usize {
        let text = self.as_bytes();
        let mut out = Vec::with_capacity(text.len());
        let mut count = 0;
        let mut i = 0;

        while i < text.len() {
            if text[i] == b'%' && i + 2 < text.len() {
                if let (Some(hi), Some(lo)) = (hex_value(text[i + 1]), hex_value(text[i + 2])) {
                    let value = (hi << 4) | lo;
                    if value != 0 {
                        out.push(value);
                        count += 1;
                        i += 3;
                        continue;
                    }
                }
            }
            out.push(text[i]);
            i += 1;
        }

        if count > 0 {
            self.assign(&out);
        }
        count
    }
}

impl Default for XString {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq<[u8]> for XString {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<str> for XString {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq for XString {
    fn eq(&self, other: &XString) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Write for XString {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s.as_bytes());
        Ok(())
    }
}

impl fmt::Display for XString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;
        // 8-bit text: every byte maps to one character
        for &b in self.as_bytes() {
            f.write_char(b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for XString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XString(\"")?;
        for &b in self.as_bytes() {
            if (0x20..0x7f).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        write!(f, "\")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec;
    use core::fmt::Write as _;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_variants() {
        let empty = XString::new();
        assert_eq!(empty.capacity(), 0);
        assert_eq!(empty.as_bytes_with_nul(), b"\0");

        let reserved = XString::with_capacity(16);
        assert_eq!(reserved.capacity(), 16);
        assert_eq!(reserved.len(), 0);
        assert_eq!(reserved.as_bytes_with_nul(), b"\0");

        let copied = XString::from_copy(b"abc", 5);
        assert_eq!(copied.as_bytes(), b"abc");
        assert_eq!(copied.capacity(), 9);

        let adopted = XString::from_heap(b"hello\0junk".to_vec());
        assert_eq!(adopted.as_bytes(), b"hello");
        assert_eq!(adopted.capacity(), 6);

        let unterminated = XString::from_heap(b"raw".to_vec());
        assert_eq!(unterminated.as_bytes_with_nul(), b"raw\0");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut s = XString::from_copy(b"data", 0);
        s.clear();
        assert_eq!(s.capacity(), 0);
        assert!(s.is_empty());
        s.clear();
        assert_eq!(s.capacity(), 0);
    }

    #[test]
    fn test_reserve_never_shrinks() {
        let mut s = XString::from_copy(b"abc", 0);
        assert_eq!(s.reserve(32), 32);
        assert_eq!(s.reserve(8), 32);
        assert_eq!(s.as_bytes(), b"abc");
    }

    #[test]
    fn test_append_nothing_is_noop() {
        let mut s = XString::from_copy(b"keep", 0);
        let before = s.as_bytes_with_nul().as_ptr();

        assert_eq!(s.append(b""), 0);
        assert_eq!(s.append_char(0), 0);
        assert_eq!(s.len(), 4);
        assert_eq!(s.as_bytes_with_nul().as_ptr(), before);
    }

    #[test]
    fn test_append_grows_exactly() {
        let mut s = XString::new();
        assert_eq!(s.append(b"abc"), 3);
        assert_eq!(s.capacity(), 4);
        assert_eq!(s.append_char(b'd'), 4);
        assert_eq!(s.capacity(), 5);

        let other = XString::from_copy(b"ef", 0);
        assert_eq!(s.append_xstring(&other), 6);
        assert_eq!(s.as_bytes_with_nul(), b"abcdef\0");
    }

    #[test]
    fn test_assign_empty_keeps_capacity() {
        let mut s = XString::with_capacity(64);
        s.assign(b"some text");
        assert_eq!(s.assign(b""), 0);
        assert_eq!(s.len(), 0);
        assert_eq!(s.capacity(), 64);
        assert_eq!(s.as_bytes_with_nul(), b"\0");

        // Shorter slice of a longer source
        let source = b"truncated source";
        assert_eq!(s.assign(&source[..9]), 9);
        assert_eq!(s.as_bytes(), b"truncated");
        assert_eq!(s.capacity(), 64);
    }

    #[test]
    fn test_copy_from_is_deep() {
        let original = XString::from_copy(b"original", 0);
        let mut copy = XString::new();
        copy.copy_from(&original);
        copy.append(b"!");
        assert_eq!(original.as_bytes(), b"original");
        assert_eq!(copy.as_bytes(), b"original!");
    }

    #[test]
    fn test_splice_replaces_word() {
        let mut s = XString::from_copy(b"This is a test string.", 0);
        assert_eq!(s.splice(10, 4, b"stupid"), 24);
        assert_eq!(s.as_bytes(), b"This is a stupid string.");
    }

    #[test]
    fn test_splice_growth_keeps_tail() {
        // Reallocating path
        let mut s = XString::from_copy(b"AAAABBBB", 0);
        s.splice(2, 2, b"XXXXXXXX");
        assert_eq!(s.as_bytes_with_nul(), b"AAXXXXXXXXBBBB\0");

        // In-place path with overlapping move
        let mut s = XString::from_copy(b"AAAABBBB", 0);
        s.reserve(64);
        s.splice(2, 2, b"XXXXXXXX");
        assert_eq!(s.as_bytes_with_nul(), b"AAXXXXXXXXBBBB\0");
        assert_eq!(s.capacity(), 64);
    }

    #[test]
    fn test_splice_degenerate_cases() {
        let mut s = XString::from_copy(b"abcdef", 0);

        // Pure insertion
        assert_eq!(s.splice(3, 0, b"123"), 9);
        assert_eq!(s.as_bytes(), b"abc123def");

        // Pure deletion
        assert_eq!(s.splice(0, 3, b""), 6);
        assert_eq!(s.as_bytes(), b"123def");

        // Offset at the end appends
        assert_eq!(s.splice(6, 0, b"!"), 7);
        assert_eq!(s.as_bytes(), b"123def!");

        // Out of range does nothing
        assert_eq!(s.splice(5, 3, b"zz"), 0);
        assert_eq!(s.splice(8, 0, b"zz"), 0);
        assert_eq!(s.as_bytes(), b"123def!");
    }

    #[test]
    fn test_find_replace_progresses() {
        let mut s = XString::from_copy(b"aXbXcXd", 0);
        let mut shift = ShiftTable::new();
        let mut offset = 0;
        let mut calls = 0;

        while s.find_replace(&mut offset, b"X", b"-", &mut shift, calls > 0) != 0 {
            calls += 1;
        }

        assert_eq!(calls, 3);
        assert_eq!(s.as_bytes(), b"a-b-c-d");
        assert_eq!(s.len(), 7);
    }

    #[test]
    fn test_shift_table_rebuilt_for_new_pattern() {
        let mut shift = ShiftTable::new();
        let mut first = XString::from_copy(b"xab", 0);
        let mut offset = 0;
        assert_ne!(first.find_replace(&mut offset, b"ab", b"-", &mut shift, false), 0);

        // Same length, different bytes: the stale shifts must not be used
        let mut second = XString::from_copy(b"xcd", 0);
        let mut offset = 0;
        assert_eq!(second.find_replace(&mut offset, b"cd", b"-", &mut shift, true), 2);
        assert_eq!(second.as_bytes(), b"x-");
    }

    #[test]
    fn test_find_replace_does_not_rescan_replacement() {
        let mut s = XString::from_copy(b"a.b.c", 0);
        assert_eq!(s.find_replace_all(b".", b".."), 2);
        assert_eq!(s.as_bytes(), b"a..b..c");

        let mut s = XString::from_copy(b"XX", 0);
        assert_eq!(s.find_replace_all(b"X", b""), 2);
        assert!(s.is_empty());
    }

    #[test]
    fn test_find_replace_longer_pattern() {
        let mut s = XString::from_copy(b"the cat sat on the mat with the hat", 0);
        assert_eq!(s.find_replace_all(b"the", b"a"), 3);
        assert_eq!(s.as_bytes(), b"a cat sat on a mat with a hat");
        assert_eq!(s.find_replace_all(b"dog", b"x"), 0);
    }

    #[test]
    fn test_convert_line_endings() {
        let mut s = XString::from_copy(b"one\r\ntwo\r\nthree", 0);
        assert_eq!(s.convert_line_endings(LineFormat::Unix), 2);
        assert_eq!(s.as_bytes(), b"one\ntwo\nthree");

        assert_eq!(s.convert_line_endings(LineFormat::Dos), 2);
        assert_eq!(s.as_bytes(), b"one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_find_word() {
        let s = XString::from_copy(b"SET PATH=C:\\OS2;PATHS", 0);
        let delims = b" =;";
        assert_eq!(s.find_word(b"PATH", 0, delims, delims), Some(4));
        assert_eq!(s.find_word(b"PATH", 5, delims, delims), None);
        assert_eq!(s.find_word(b"SET", 0, delims, delims), Some(0));
        assert_eq!(s.find_word(b"PATHS", 0, delims, delims), Some(16));
    }

    #[test]
    fn test_encode_decode() {
        let mut s = XString::from_copy(b"a b%c", 0);
        assert_eq!(s.encode(b" %"), 2);
        assert_eq!(s.as_bytes(), b"a%20b%25c");

        assert_eq!(s.decode(), 2);
        assert_eq!(s.as_bytes(), b"a b%c");

        let mut bad = XString::from_copy(b"100%zz%00%4", 0);
        assert_eq!(bad.decode(), 0);
        assert_eq!(bad.as_bytes(), b"100%zz%00%4");
    }

    #[test]
    fn test_formatted_append() {
        let mut s = XString::from_copy(b"count=", 0);
        write!(s, "{}/{}", 3, 7).unwrap();
        assert_eq!(s.as_str(), Some("count=3/7"));
        assert!(s == *"count=3/7");
        assert_eq!(format!("{}", s), "count=3/7");
        assert_eq!(s.into_bytes(), vec![b'c', b'o', b'u', b'n', b't', b'=', b'3', b'/', b'7']);
    }
}
