//! Ingredient-list tokenization.
//!
//! Pipeline:
//!   raw &str
//!     └─ split_segments()     → raw segments
//!          └─ strip_label()   → label-free segments
//!               └─ clean_token() → Token (or dropped)

use std::sync::LazyLock;

use larder_core::ontology::normalize_text;
use regex::Regex;

/// Labels that introduce an ingredient list rather than name an ingredient.
const LEADING_LABELS: &[&str] = &["ingredients:", "contains:", "made with:"];

/// Connective and non-ingredient phrases that are dropped outright.
const STOPLIST: &[&str] = &[
  "and",
  "or",
  "and/or",
  "with",
  "of",
  "natural",
  "flavoring",
  "flavouring",
  "flavor",
  "flavour",
  "natural flavoring",
  "natural flavouring",
  "natural flavor",
  "natural flavors",
  "artificial flavor",
  "artificial flavors",
  "artificial flavoring",
  "less than",
  "contains less than",
  "contains",
  "ingredients",
];

const MIN_TOKEN_CHARS: usize = 2;
const MAX_TOKEN_CHARS: usize = 100;

static PARENTHESIZED_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\(\s*\d+(?:\.\d+)?\s*%\s*\)").expect("valid regex")
});

static BARE_PERCENT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*%").expect("valid regex"));

/// One candidate ingredient, as written and in normal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
  /// Cleaned text with the original casing, carried verbatim when unmatched.
  pub original:   String,
  /// Lowercased, whitespace-collapsed lookup key.
  pub normalized: String,
}

pub(crate) fn tokenize(text: &str) -> Vec<Token> {
  split_segments(text)
    .iter()
    .map(|segment| strip_label(segment))
    .filter_map(clean_token)
    .collect()
}

/// Remove a leading label from one segment, so "Contains: milk" after a
/// sentence break yields "milk".
fn strip_label(segment: &str) -> &str {
  let trimmed = segment.trim_start();
  LEADING_LABELS
    .iter()
    .find_map(|label| strip_prefix_ignore_case(trimmed, label))
    .unwrap_or(trimmed)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
  let head = s.get(..prefix.len())?;
  head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Split on `,` `;` `.` and line breaks. A `.` between two digits is a
/// decimal point and does not split.
fn split_segments(text: &str) -> Vec<String> {
  let chars: Vec<char> = text.chars().collect();
  let mut segments = Vec::new();
  let mut current = String::new();

  for (i, &c) in chars.iter().enumerate() {
    let is_separator = match c {
      ',' | ';' | '\n' | '\r' => true,
      '.' => {
        let digit_before = i > 0 && chars[i - 1].is_ascii_digit();
        let digit_after = chars.get(i + 1).is_some_and(char::is_ascii_digit);
        !(digit_before && digit_after)
      }
      _ => false,
    };
    if is_separator {
      segments.push(std::mem::take(&mut current));
    } else {
      current.push(c);
    }
  }
  segments.push(current);
  segments
}

fn clean_token(segment: &str) -> Option<Token> {
  let without_pct = PARENTHESIZED_PERCENT.replace_all(segment, " ");
  let without_pct = BARE_PERCENT.replace_all(&without_pct, " ");
  let collapsed = without_pct.split_whitespace().collect::<Vec<_>>().join(" ");
  let original = collapsed
    .trim_matches(|c: char| {
      matches!(c, '(' | ')' | '[' | ']' | '*' | '-' | '•' | '"' | ':')
    })
    .trim()
    .to_string();

  let length = original.chars().count();
  if !(MIN_TOKEN_CHARS..=MAX_TOKEN_CHARS).contains(&length) {
    return None;
  }
  let normalized = normalize_text(&original);
  if STOPLIST.contains(&normalized.as_str()) {
    return None;
  }
  Some(Token {
    original,
    normalized,
  })
}
