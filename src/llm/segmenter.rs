/// Opening markers for a reasoning block, matched exactly and case-sensitively.
const OPEN_MARKERS: [&str; 2] = ["<thinking>", "<think>"];
const CLOSE_MARKERS: [&str; 2] = ["</thinking>", "</think>"];

/// Snapshot of the visible/thinking split after a `feed` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments {
    pub visible: String,
    pub thinking: String,
}

/// Splits a streamed response into answer text and inline reasoning text.
///
/// Models that emit reasoning traces wrap them in `<think>`/`<thinking>`
/// tags, but streaming fragments arrive with no alignment to tag boundaries.
/// The segmenter therefore re-derives the split from the entire accumulated
/// text on every `feed`, so a tag split across two fragments is picked up as
/// soon as its second half arrives.
///
/// Only the first open/close pair is honored per session: a second opening
/// tag after the block has closed is treated as literal answer text. An
/// unterminated tag fails open, classifying everything after it as thinking
/// until the stream ends.
#[derive(Debug, Default)]
pub struct StreamSegmenter {
    raw: String,
}

impl StreamSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the recomputed split.
    ///
    /// While the block is open, `thinking` grows with each fragment. Once it
    /// closes, `thinking` is reported empty (already surfaced) and new text
    /// appends to `visible`.
    pub fn feed(&mut self, fragment: &str) -> Segments {
        self.raw.push_str(fragment);
        self.snapshot()
    }

    /// The current split without feeding new text.
    pub fn snapshot(&self) -> Segments {
        let raw = &self.raw;

        let Some((open_at, open_len)) = find_first(raw, &OPEN_MARKERS) else {
            return Segments {
                visible: raw.clone(),
                thinking: String::new(),
            };
        };

        let before = &raw[..open_at];
        let after_open = &raw[open_at + open_len..];

        match find_first(after_open, &CLOSE_MARKERS) {
            // Open but not yet closed: everything past the tag is reasoning.
            None => Segments {
                visible: before.to_string(),
                thinking: after_open.to_string(),
            },
            // Closed: the block has already been surfaced, so report it empty
            // and stitch the answer back together around it.
            Some((close_at, close_len)) => Segments {
                visible: format!("{}{}", before, &after_open[close_at + close_len..]),
                thinking: String::new(),
            },
        }
    }

    /// Full text seen so far, tags included.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The reasoning block captured so far, for display purposes. Unlike the
    /// `thinking` field of a snapshot this does not go empty on close.
    pub fn reasoning(&self) -> &str {
        let raw = &self.raw;
        let Some((open_at, open_len)) = find_first(raw, &OPEN_MARKERS) else {
            return "";
        };
        let after_open = &raw[open_at + open_len..];
        match find_first(after_open, &CLOSE_MARKERS) {
            None => after_open,
            Some((close_at, _)) => &after_open[..close_at],
        }
    }
}

/// Length of the visible prefix that is safe to print while more fragments
/// may still arrive.
///
/// A fragment boundary can land mid-tag, leaving something like `A<thin` in
/// the visible text. Printing that tail and later learning it was an opening
/// tag cannot be undone on a terminal, so any trailing partial opening marker
/// is held back until the next fragment resolves it.
pub fn stable_prefix_len(visible: &str) -> usize {
    let max_hold = OPEN_MARKERS.iter().map(|m| m.len()).max().unwrap_or(1) - 1;
    let start = visible.len().saturating_sub(max_hold);
    for i in start..visible.len() {
        if !visible.is_char_boundary(i) {
            continue;
        }
        let tail = &visible[i..];
        if OPEN_MARKERS.iter().any(|m| m.starts_with(tail)) {
            return i;
        }
    }
    visible.len()
}

/// Earliest occurrence of any marker, with its byte length.
fn find_first(haystack: &str, markers: &[&str]) -> Option<(usize, usize)> {
    markers
        .iter()
        .filter_map(|m| haystack.find(m).map(|at| (at, m.len())))
        .min_by_key(|&(at, _)| at)
}
