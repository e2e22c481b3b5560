//! Bitap approximate matcher with location-weighted scoring.
//!
//! A score of 0.0 is a perfect match at the expected location; 1.0 is no
//! match. Each error costs `1 / pattern_len`, and each character of drift
//! from the expected location costs `1 / distance`.

use std::collections::HashMap;

use regex::Regex;

use deckhand_shared::SearchOptions;

/// Score reported for a perfect bitap hit, so it still sorts as a match.
const PERFECT_HIT_SCORE: f64 = 0.001;

/// Score reported by the word-alternation fallback on a hit.
const FALLBACK_HIT_SCORE: f64 = 0.5;

/// Outcome of matching one pattern against one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitapMatch {
    pub is_match: bool,
    pub score: f64,
}

impl BitapMatch {
    const MISS: Self = Self {
        is_match: false,
        score: 1.0,
    };
}

/// How a compiled pattern is matched.
#[derive(Debug, Clone)]
enum Strategy {
    /// Bit `len - 1 - i` is set for every position `i` holding the char.
    Bitap { alphabet: HashMap<char, u64> },
    /// Pattern exceeds `max_pattern_length`: match any of its words.
    /// `None` when the alternation could not be compiled.
    Words(Option<Regex>),
}

/// A compiled pattern.
#[derive(Debug, Clone)]
pub struct Bitap {
    pattern: Vec<char>,
    strategy: Strategy,
    options: SearchOptions,
}

impl Bitap {
    pub fn new(pattern: &str, options: &SearchOptions) -> Self {
        let pattern = normalize(pattern, options);
        let chars: Vec<char> = pattern.chars().collect();

        let max_len = options
            .max_pattern_length
            .clamp(1, deckhand_shared::MAX_BITAP_PATTERN_LENGTH);
        let strategy = if chars.len() > max_len {
            Strategy::Words(word_alternation(&pattern))
        } else {
            let len = chars.len();
            let mut alphabet = HashMap::new();
            for (i, c) in chars.iter().enumerate() {
                *alphabet.entry(*c).or_insert(0u64) |= 1u64 << (len - i - 1);
            }
            Strategy::Bitap { alphabet }
        };

        Self {
            pattern: chars,
            strategy,
            options: options.clone(),
        }
    }

    /// Match the pattern against `text`.
    pub fn search(&self, text: &str) -> BitapMatch {
        if self.pattern.is_empty() {
            return BitapMatch::MISS;
        }

        let text = normalize(text, &self.options);
        let chars: Vec<char> = text.chars().collect();

        if chars == self.pattern {
            return BitapMatch {
                is_match: true,
                score: 0.0,
            };
        }

        match &self.strategy {
            Strategy::Bitap { alphabet } => self.bitap(alphabet, &chars),
            Strategy::Words(Some(regex)) if regex.is_match(&text) => BitapMatch {
                is_match: true,
                score: FALLBACK_HIT_SCORE,
            },
            Strategy::Words(_) => BitapMatch::MISS,
        }
    }

    fn score(&self, errors: usize, location: usize) -> f64 {
        let accuracy = errors as f64 / self.pattern.len() as f64;
        let proximity = self.options.location.abs_diff(location);

        if self.options.distance == 0 {
            return if proximity == 0 { accuracy } else { 1.0 };
        }
        accuracy + proximity as f64 / self.options.distance as f64
    }

    fn bitap(&self, alphabet: &HashMap<char, u64>, text: &[char]) -> BitapMatch {
        let pattern_len = self.pattern.len();
        let text_len = text.len();
        let expected = self.options.location;
        let mut threshold = self.options.threshold;

        // Exact occurrences near the expected location tighten the threshold.
        if let Some(pos) = find_from(text, &self.pattern, expected) {
            threshold = threshold.min(self.score(0, pos));
            if let Some(pos) = rfind_from(text, &self.pattern, expected + pattern_len) {
                threshold = threshold.min(self.score(0, pos));
            }
        }

        let mask = 1u64 << (pattern_len - 1);
        let mut best: Option<(usize, f64)> = None;
        let mut matched = vec![false; text_len];
        let mut last_bits: Vec<u64> = Vec::new();
        let mut bin_max = pattern_len + text_len;

        for errors in 0..pattern_len {
            // Binary search for how far from `expected` this error level can reach.
            let mut bin_min = 0;
            let mut bin_mid = bin_max;
            while bin_min < bin_mid {
                if self.score(errors, expected + bin_mid) <= threshold {
                    bin_min = bin_mid;
                } else {
                    bin_max = bin_mid;
                }
                bin_mid = (bin_max - bin_min) / 2 + bin_min;
            }
            bin_max = bin_mid;

            let mut start = (expected + 1).saturating_sub(bin_mid).max(1);
            let finish = (expected + bin_mid).min(text_len) + pattern_len;

            let mut bits = vec![0u64; finish + 2];
            bits[finish + 1] = (1u64 << errors) - 1;
            let last = |k: usize| last_bits.get(k).copied().unwrap_or(0);

            let mut j = finish;
            while j >= start {
                let current = j - 1;
                let char_match = text
                    .get(current)
                    .and_then(|c| alphabet.get(c))
                    .copied()
                    .unwrap_or(0);
                if char_match != 0 {
                    matched[current] = true;
                }

                bits[j] = ((bits[j + 1] << 1) | 1) & char_match;
                if errors != 0 {
                    bits[j] |= (((last(j + 1) | last(j)) << 1) | 1) | last(j + 1);
                }

                if bits[j] & mask != 0 {
                    let score = self.score(errors, current);
                    if score <= threshold {
                        threshold = score;
                        best = Some((current, score));
                        if current <= expected {
                            break;
                        }
                        start = (2 * expected).saturating_sub(current).max(1);
                    }
                }
                j -= 1;
            }

            if self.score(errors + 1, expected) > threshold {
                break;
            }
            last_bits = bits;
        }

        match best {
            Some((_, score)) if has_run(&matched, self.options.min_match_char_length) => {
                BitapMatch {
                    is_match: true,
                    score: if score == 0.0 { PERFECT_HIT_SCORE } else { score },
                }
            }
            _ => BitapMatch::MISS,
        }
    }
}

fn normalize(s: &str, options: &SearchOptions) -> String {
    if options.case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

/// Regex matching any whitespace-separated word of `pattern`.
fn word_alternation(pattern: &str) -> Option<Regex> {
    let words: Vec<String> = pattern.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    Regex::new(&words.join("|"))
        .inspect_err(|e| tracing::warn!(error = %e, "pattern alternation rejected"))
        .ok()
}

/// First start index `>= from` where `needle` occurs in `haystack`.
fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Last start index `<= from` where `needle` occurs in `haystack`.
fn rfind_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let last_start = from.min(haystack.len() - needle.len());
    (0..=last_start)
        .rev()
        .find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Whether `matched` has a run of at least `min_len` consecutive hits.
fn has_run(matched: &[bool], min_len: usize) -> bool {
    let min_len = min_len.max(1);
    let mut run = 0;
    for &hit in matched {
        run = if hit { run + 1 } else { 0 };
        if run >= min_len {
            return true;
        }
    }
    false
}
