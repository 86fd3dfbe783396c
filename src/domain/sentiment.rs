//! Lexicon-based headline sentiment.
//!
//! Each known word carries a polarity in [-1, 1] and a subjectivity in
//! [0, 1]. A headline scores the mean of its matched words; a negation word
//! directly before a match flips and halves that word's polarity.

/// Headlines used when no news source yields anything.
pub const NEUTRAL_HEADLINES: [&str; 2] = [
    "Market remains stable with cautious optimism.",
    "Trading volumes expected to hold steady.",
];

const NEGATIONS: [&str; 5] = ["not", "no", "never", "without", "isn't"];

const LEXICON: &[(&str, f64, f64)] = &[
    ("bad", -0.7, 0.67),
    ("bankruptcy", -0.7, 0.6),
    ("bearish", -0.6, 0.7),
    ("beat", 0.3, 0.4),
    ("boom", 0.5, 0.6),
    ("bullish", 0.6, 0.7),
    ("cautious", -0.1, 0.4),
    ("crash", -0.8, 0.8),
    ("crisis", -0.6, 0.6),
    ("drop", -0.3, 0.4),
    ("drops", -0.3, 0.4),
    ("fall", -0.3, 0.4),
    ("falls", -0.3, 0.4),
    ("fear", -0.5, 0.6),
    ("fears", -0.5, 0.6),
    ("gain", 0.3, 0.4),
    ("gains", 0.3, 0.4),
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("growth", 0.3, 0.4),
    ("loss", -0.4, 0.4),
    ("losses", -0.4, 0.4),
    ("optimism", 0.5, 0.5),
    ("optimistic", 0.5, 0.5),
    ("plunge", -0.6, 0.6),
    ("plunges", -0.6, 0.6),
    ("positive", 0.23, 0.55),
    ("profit", 0.4, 0.4),
    ("profits", 0.4, 0.4),
    ("rally", 0.4, 0.5),
    ("recession", -0.6, 0.5),
    ("recovery", 0.3, 0.4),
    ("rise", 0.2, 0.3),
    ("rises", 0.2, 0.3),
    ("risk", -0.2, 0.4),
    ("risks", -0.2, 0.4),
    ("slump", -0.5, 0.5),
    ("soar", 0.6, 0.6),
    ("soars", 0.6, 0.6),
    ("stable", 0.2, 0.4),
    ("steady", 0.2, 0.3),
    ("strong", 0.43, 0.73),
    ("surge", 0.5, 0.6),
    ("uncertainty", -0.3, 0.5),
    ("volatile", -0.3, 0.6),
    ("weak", -0.375, 0.625),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

impl Sentiment {
    /// Polarity amplified by subjectivity.
    pub fn weighted(&self) -> f64 {
        self.polarity * (1.0 + self.subjectivity)
    }
}

fn lookup(word: &str) -> Option<(f64, f64)> {
    LEXICON
        .binary_search_by(|(w, _, _)| (*w).cmp(word))
        .ok()
        .map(|i| (LEXICON[i].1, LEXICON[i].2))
}

pub fn analyze(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();

    let mut polarity = 0.0;
    let mut subjectivity = 0.0;
    let mut matched = 0usize;
    for (i, word) in words.iter().enumerate() {
        let Some((p, s)) = lookup(word) else {
            continue;
        };
        let negated = i > 0 && NEGATIONS.contains(&words[i - 1]);
        polarity += if negated { -0.5 * p } else { p };
        subjectivity += s;
        matched += 1;
    }

    if matched == 0 {
        return Sentiment {
            polarity: 0.0,
            subjectivity: 0.0,
        };
    }
    Sentiment {
        polarity: polarity / matched as f64,
        subjectivity: subjectivity / matched as f64,
    }
}

/// Mean weighted sentiment over `headlines`; 0.0 when there are none.
pub fn average_weighted<S: AsRef<str>>(headlines: &[S]) -> f64 {
    if headlines.is_empty() {
        return 0.0;
    }
    headlines
        .iter()
        .map(|h| analyze(h.as_ref()).weighted())
        .sum::<f64>()
        / headlines.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lexicon_is_sorted() {
        assert!(LEXICON.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn positive_and_negative_words() {
        assert!(analyze("Stocks rally on strong profits").polarity > 0.0);
        assert!(analyze("Markets crash amid recession fears").polarity < 0.0);
        assert_eq!(
            analyze("Quarterly filing published"),
            Sentiment {
                polarity: 0.0,
                subjectivity: 0.0
            }
        );
    }

    #[test]
    fn negation_flips_and_dampens() {
        let s = analyze("Outlook is not good");
        assert_relative_eq!(s.polarity, -0.35);
        assert_relative_eq!(s.subjectivity, 0.6);
    }

    #[test]
    fn weighted_average() {
        let s = analyze("good");
        assert_relative_eq!(s.weighted(), 0.7 * 1.6);
        let avg = average_weighted(&["good", "nothing here"]);
        assert_relative_eq!(avg, 0.7 * 1.6 / 2.0);
        assert_eq!(average_weighted::<&str>(&[]), 0.0);
    }

    #[test]
    fn neutral_headlines_are_mildly_positive() {
        let avg = average_weighted(&NEUTRAL_HEADLINES);
        assert!(avg > 0.0);
        assert!(avg < 0.5);
    }
}
