//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
///
/// Substitution is single-pass over the template: text coming from a value
/// (e.g. an uploaded document containing `{question}`) is never re-expanded.
/// Unknown `{...}` sequences are copied through verbatim.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len() + pairs.iter().map(|(_, v)| v.len()).sum::<usize>());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let replaced = after.find('}').and_then(|close| {
      let key = &after[..close];
      pairs
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| (*v, close))
    });
    match replaced {
      Some((value, close)) => {
        out.push_str(value);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Character-bounded prefix of `s`. Returns the prefix and whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
  match s.char_indices().nth(max_chars) {
    Some((byte_idx, _)) => (&s[..byte_idx], true),
    None => (s, false),
  }
}

/// Prefix of at most `max_chars` characters with a trailing `...` when it was cut.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
  match truncate_chars(s, max_chars) {
    (head, true) => format!("{head}..."),
    (whole, false) => whole.to_string(),
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  match truncate_chars(s, max) {
    (head, true) => format!("{}… ({} bytes total)", head, s.len()),
    (whole, false) => whole.to_string(),
  }
}
