//! Risk-phrase detection over the raw ingredient text.
//!
//! Phrases come from the snapshot already normalized and sorted longest
//! first. The scan folds the raw text the same way (lowercase, whitespace
//! runs collapsed) while remembering where each folded character came from,
//! so reported offsets and spans refer to the caller's original text.

use larder_core::{OntologySnapshot, ontology::RiskPhrase};

use crate::DetectedRiskPhrase;

/// Raw text with a per-character case/whitespace fold.
struct FoldedText {
  original: Vec<char>,
  folded:   Vec<char>,
  /// `origin[i]` is the index in `original` of `folded[i]`.
  origin:   Vec<usize>,
}

impl FoldedText {
  fn new(text: &str) -> Self {
    let original: Vec<char> = text.chars().collect();
    let mut folded = Vec::with_capacity(original.len());
    let mut origin = Vec::with_capacity(original.len());
    let mut in_space = true;

    for (i, c) in original.iter().enumerate() {
      if c.is_whitespace() {
        if !in_space {
          folded.push(' ');
          origin.push(i);
          in_space = true;
        }
      } else {
        // One folded char per source char keeps offsets aligned.
        folded.push(c.to_lowercase().next().unwrap_or(*c));
        origin.push(i);
        in_space = false;
      }
    }
    Self {
      original,
      folded,
      origin,
    }
  }

  fn find_from(&self, needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > self.folded.len() {
      return None;
    }
    (from..=self.folded.len() - needle.len())
      .find(|&i| self.folded[i..i + needle.len()] == *needle)
  }

  /// End (exclusive, in original chars) of the sentence containing
  /// `original_index`: the next `.`, `;` or line break.
  fn sentence_end(&self, original_index: usize) -> usize {
    self.boundary(original_index, false)
  }

  /// End (exclusive, in original chars) of the list item containing
  /// `original_index`: like [`Self::sentence_end`], but a `,` also ends it.
  fn item_end(&self, original_index: usize) -> usize {
    self.boundary(original_index, true)
  }

  /// A `.` between digits is a decimal point and never a boundary.
  fn boundary(&self, from: usize, stop_at_comma: bool) -> usize {
    let chars = &self.original;
    (from..chars.len())
      .find(|&i| match chars[i] {
        ';' | '\n' | '\r' => true,
        ',' => stop_at_comma,
        '.' => {
          let digit_before = i > 0 && chars[i - 1].is_ascii_digit();
          let digit_after = chars.get(i + 1).is_some_and(char::is_ascii_digit);
          !(digit_before && digit_after)
        }
        _ => false,
      })
      .unwrap_or(chars.len())
  }

  fn slice(&self, start: usize, end: usize) -> String {
    self.original[start..end].iter().collect()
  }
}

/// A detected phrase plus the span of original text it covers: the phrase
/// and the rest of its list item. Items after the next `,` are ingredients
/// again and stay outside the span.
pub(crate) struct PhraseHit {
  pub detected: DetectedRiskPhrase,
  pub span:     (usize, usize),
}

/// Scan `text` for every risk phrase in the snapshot, longest first.
///
/// An occurrence that overlaps text already claimed by a longer phrase is
/// skipped, so a generic phrase never shadows a more specific one. Hits are
/// returned in order of appearance.
pub(crate) fn scan(text: &str, snapshot: &OntologySnapshot) -> Vec<PhraseHit> {
  let folded = FoldedText::new(text);
  let mut claimed: Vec<(usize, usize)> = Vec::new();
  let mut hits = Vec::new();

  for phrase in snapshot.risk_phrases() {
    let needle: Vec<char> = phrase.phrase.chars().collect();
    let mut from = 0;
    while let Some(start) = folded.find_from(&needle, from) {
      let end = start + needle.len();
      let overlaps = claimed.iter().any(|&(s, e)| start < e && s < end);
      if overlaps {
        from = start + 1;
        continue;
      }
      claimed.push((start, end));
      hits.push(hit(&folded, phrase, start, end));
      from = end;
    }
  }

  hits.sort_by_key(|h| h.detected.offset);
  hits
}

fn hit(
  folded: &FoldedText,
  phrase: &RiskPhrase,
  start: usize,
  end: usize,
) -> PhraseHit {
  let offset = folded.origin[start];
  let phrase_end = folded.origin[end - 1] + 1;
  let sentence_end = folded.sentence_end(phrase_end);
  let item_end = folded.item_end(phrase_end);
  PhraseHit {
    detected: DetectedRiskPhrase {
      phrase_id: phrase.phrase_id,
      phrase: phrase.phrase.clone(),
      matched_text: folded.slice(offset, phrase_end),
      context: folded.slice(offset, sentence_end).trim().to_string(),
      offset,
      risk_type: phrase.risk_type,
      output_risk_level: phrase.output_risk_level,
      allergen_id: phrase.allergen_id,
      confidence: phrase.confidence,
    },
    span:     (offset, item_end),
  }
}

/// Replace every character inside `spans` with a space.
pub(crate) fn mask(text: &str, spans: &[(usize, usize)]) -> String {
  text
    .chars()
    .enumerate()
    .map(|(i, c)| {
      if spans.iter().any(|&(s, e)| i >= s && i < e) {
        ' '
      } else {
        c
      }
    })
    .collect()
}
