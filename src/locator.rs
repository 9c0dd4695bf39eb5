//! Supporting-snippet lookup.
//!
//! Heuristic only: the first 20 characters of some reference text (usually the
//! model's own answer or feedback) are searched case-insensitively in the
//! document and the surrounding window is cited. No fuzzy matching, no ranking.

/// Returned when the reference prefix does not occur in the document.
pub const SNIPPET_NOT_FOUND: &str = "[Reference not found in document]";

/// Number of leading reference characters used as the search needle.
pub const REFERENCE_PREFIX_CHARS: usize = 20;

pub const DEFAULT_WINDOW: usize = 50;

/// Find an excerpt of `document` around the first occurrence of the
/// (lowercased) 20-character prefix of `reference`.
///
/// Offsets are counted in characters. The excerpt spans `window` characters on
/// each side of the match start, widened on the right when needed so the
/// matched prefix itself is always included.
pub fn locate(document: &str, reference: &str, window: usize) -> String {
  let haystack: Vec<char> = document.chars().collect();
  let needle: Vec<char> = reference.chars().take(REFERENCE_PREFIX_CHARS).map(fold).collect();

  let Some(idx) = find_folded(&haystack, &needle) else {
    return SNIPPET_NOT_FOUND.to_string();
  };

  let start = idx.saturating_sub(window);
  let end = (idx + window.max(needle.len())).min(haystack.len());
  haystack[start..end].iter().collect()
}

/// Simple per-char case folding; good enough for a citation heuristic.
fn fold(c: char) -> char {
  c.to_lowercase().next().unwrap_or(c)
}

fn find_folded(haystack: &[char], needle: &[char]) -> Option<usize> {
  if needle.is_empty() {
    return Some(0);
  }
  if needle.len() > haystack.len() {
    return None;
  }
  (0..=haystack.len() - needle.len())
    .find(|&i| haystack[i..i + needle.len()].iter().zip(needle).all(|(h, n)| fold(*h) == *n))
}
