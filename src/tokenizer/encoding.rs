//! BPE encodings backed by the published tiktoken vocabularies.
//!
//! Text is cut into short segments whose boundaries depend only on the
//! characters before them, so appending text never moves an earlier boundary.
//! Each segment is charged the largest BPE count of any of its prefixes. The
//! count for a string is therefore never smaller than the count for any of its
//! prefixes.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Longest run of characters charged as one segment.
const MAX_SEGMENT_CHARS: usize = 24;

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

/// Encoding families used by the supported chat models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    fn encoder(&self) -> Option<&'static CoreBPE> {
        let cell = match self {
            Self::Cl100kBase => &CL100K,
            Self::O200kBase => &O200K,
        };
        cell.get_or_init(|| self.load()).as_ref()
    }

    fn load(&self) -> Option<CoreBPE> {
        let loaded = match self {
            Self::Cl100kBase => tiktoken_rs::cl100k_base(),
            Self::O200kBase => tiktoken_rs::o200k_base(),
        };
        match loaded {
            Ok(bpe) => Some(bpe),
            Err(error) => {
                warn!(encoding = ?self, error = %error, "Failed to load BPE vocabulary");
                None
            }
        }
    }

    /// Whether the vocabulary for this encoding loaded.
    pub fn is_available(&self) -> bool {
        self.encoder().is_some()
    }

    /// Number of BPE tokens `text` encodes to, without segmenting.
    pub fn encode_len(&self, text: &str) -> usize {
        self.encoder()
            .map(|bpe| bpe.encode_ordinary(text).len())
            .unwrap_or_default()
    }

    /// Estimated number of tokens `text` encodes to.
    pub fn count(&self, text: &str) -> usize {
        let Some(bpe) = self.encoder() else {
            return 0;
        };
        segments(text)
            .map(|segment| peak_prefix_len(bpe, segment))
            .sum()
    }
}

fn peak_prefix_len(bpe: &CoreBPE, segment: &str) -> usize {
    segment
        .char_indices()
        .map(|(i, c)| bpe.encode_ordinary(&segment[..i + c.len_utf8()]).len())
        .max()
        .unwrap_or_default()
}

/// Whether a new segment starts at `c`, given the segment so far.
fn starts_segment(prev: char, c: char, segment_chars: usize) -> bool {
    if segment_chars >= MAX_SEGMENT_CHARS {
        return true;
    }
    match (prev.is_whitespace(), c.is_whitespace()) {
        (true, true) => false,
        (false, true) => true,
        // A plain space stays attached to what follows it.
        (true, false) => prev != ' ',
        (false, false) => prev.is_alphanumeric() != c.is_alphanumeric(),
    }
}

fn segments(text: &str) -> impl Iterator<Item = &str> {
    let mut start = 0;
    let mut count = 0;
    let mut prev: Option<char> = None;
    let mut iter = text.char_indices();

    std::iter::from_fn(move || loop {
        match iter.next() {
            Some((i, c)) => {
                let cut = prev.is_some_and(|p| starts_segment(p, c, count));
                prev = Some(c);
                if cut {
                    let segment = &text[start..i];
                    start = i;
                    count = 1;
                    return Some(segment);
                }
                count += 1;
            }
            None => {
                if start < text.len() {
                    let segment = &text[start..];
                    start = text.len();
                    return Some(segment);
                }
                return None;
            }
        }
    })
}
