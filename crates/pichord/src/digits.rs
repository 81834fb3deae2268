use std::{path::Path, sync::Arc};

/// The literal prefix that marks the start of the expansion in the source
/// resource. Everything before it (headers, titles) is discarded.
const START_MARKER: &str = "3.";

/// An immutable sequence of decimal digits, indexed from 0.
///
/// Loaded once at startup and shared read-only for the lifetime of the
/// process. Cloning is cheap: the digits live behind an [`Arc`].
///
/// Lookups past the end never fail; they yield `0`. A missing resource
/// therefore degrades to an all-zero sequence instead of aborting startup.
///
/// # Example
///
/// ```
/// use pichord::DigitSequence;
///
/// let digits = DigitSequence::from_text("pi = 3.14159...");
/// assert_eq!(digits.get(0), 3);
/// assert_eq!(digits.get(4), 5);
/// assert_eq!(digits.get(1_000), 0);
/// assert_eq!(digits.digit_at_position(2), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DigitSequence {
    digits: Arc<[u8]>,
}

impl DigitSequence {
    /// Reads the digit resource at `path`.
    ///
    /// If the file is missing or unreadable a warning is logged and an empty
    /// sequence is returned.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let digits = Self::from_text(&text);
                tracing::info!(path = %path.display(), digits = digits.len(), "Loaded digit source");
                digits
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Digit source not found; rendering an all-zero sequence"
                );
                Self::default()
            }
        }
    }

    /// Builds a sequence from raw text.
    ///
    /// The text is cut at the first `"3."` marker when present, then every
    /// non-digit character is dropped.
    pub fn from_text(text: &str) -> Self {
        let body = text.find(START_MARKER).map_or(text, |at| &text[at..]);
        let digits: Vec<u8> = body
            .bytes()
            .filter(u8::is_ascii_digit)
            .map(|b| b - b'0')
            .collect();
        Self {
            digits: digits.into(),
        }
    }

    /// Returns the digit at the 0-based `offset`, or `0` past the end.
    #[inline]
    pub fn get(&self, offset: u64) -> u8 {
        usize::try_from(offset)
            .ok()
            .and_then(|i| self.digits.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the digit claimed by the 1-based `position`.
    ///
    /// Position `0` does not exist and yields `0`.
    #[inline]
    pub fn digit_at_position(&self, position: u64) -> u8 {
        match position.checked_sub(1) {
            Some(offset) => self.get(offset),
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}
