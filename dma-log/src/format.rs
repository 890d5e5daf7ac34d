//! Bounded message formatting.

use core::fmt;

/// Formatting target over a fixed byte buffer.
///
/// Output that does not fit is cut off and formatting is aborted.
pub(crate) struct Scratch<'a> {
    buf: &'a mut [u8],
    len: usize,
    truncated: bool,
}

impl<'a> Scratch<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0, truncated: false }
    }

    /// Formats `args`, returning the number of bytes written and whether output was cut off.
    pub fn format(buf: &'a mut [u8], args: fmt::Arguments) -> (usize, bool) {
        let mut this = Self::new(buf);
        // An error is either truncation or a failing formatting impl, both leave valid partial output.
        let _ = fmt::write(&mut this, args);
        (this.len, this.truncated)
    }
}

impl fmt::Write for Scratch<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;

        if n < s.len() {
            self.truncated = true;
            return Err(fmt::Error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_into_buffer() {
        let mut buf = [0; 32];
        let (n, truncated) = Scratch::format(&mut buf, format_args!("Test message {}\n", 3));
        assert_eq!(&buf[..n], b"Test message 3\n");
        assert!(!truncated);
    }

    #[test]
    fn exact_fit_is_not_truncation() {
        let mut buf = [0; 5];
        let (n, truncated) = Scratch::format(&mut buf, format_args!("{}", "abcde"));
        assert_eq!(n, 5);
        assert!(!truncated);
    }

    #[test]
    fn cuts_off_overlong_output() {
        let mut buf = [0; 8];
        let (n, truncated) = Scratch::format(&mut buf, format_args!("value={:08x}", 0xdead_beef_u32));
        assert_eq!(&buf[..n], b"value=de");
        assert!(truncated);
    }

    #[test]
    fn empty_buffer() {
        let mut buf = [0; 0];
        let (n, truncated) = Scratch::format(&mut buf, format_args!("x"));
        assert_eq!(n, 0);
        assert!(truncated);
    }
}
