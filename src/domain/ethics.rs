//! Corruption / ESG scoring and the ethical asset filter.

use std::collections::{BTreeMap, BTreeSet};

pub const NEUTRAL_SCORE: u32 = 50;
pub const DEFAULT_MIN_SCORE: u32 = 40;

/// Scores from 0 (highly corrupt) to 100 (clean). Unknown entities score
/// [`NEUTRAL_SCORE`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptionIndex {
    countries: BTreeMap<String, u32>,
    companies: BTreeMap<String, u32>,
}

impl CorruptionIndex {
    pub fn new(countries: BTreeMap<String, u32>, companies: BTreeMap<String, u32>) -> Self {
        CorruptionIndex {
            countries,
            companies,
        }
    }

    pub fn country_score(&self, country: &str) -> u32 {
        self.countries.get(country).copied().unwrap_or(NEUTRAL_SCORE)
    }

    pub fn company_score(&self, symbol: &str) -> u32 {
        self.companies.get(symbol).copied().unwrap_or(NEUTRAL_SCORE)
    }

    /// Adds or replaces a company score.
    pub fn with_company(mut self, symbol: &str, score: u32) -> Self {
        self.companies.insert(symbol.to_string(), score.min(100));
        self
    }
}

impl Default for CorruptionIndex {
    fn default() -> Self {
        let countries = [
            ("Norway", 84),
            ("Denmark", 90),
            ("USA", 69),
            ("Germany", 79),
            ("COUNTRY_X", 15),
        ];
        let companies = [
            ("AAPL", 75),
            ("EQNR.OL", 82),
            ("COAL_CORP", 12),
            ("WEAPONS_INC", 20),
        ];
        CorruptionIndex::new(
            countries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            companies.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        )
    }
}

/// Metadata describing an asset for screening.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetProfile {
    pub symbol: String,
    pub country: Option<String>,
    pub segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Cleared,
    BlockedSegment(String),
    BlockedCountry { country: String, score: u32 },
    BlockedCompany { symbol: String, score: u32 },
}

impl Screening {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Screening::Cleared)
    }
}

impl std::fmt::Display for Screening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Screening::Cleared => f.write_str("asset is ethically cleared"),
            Screening::BlockedSegment(segment) => {
                write!(f, "segment {segment} is ethically prohibited")
            }
            Screening::BlockedCountry { country, score } => {
                write!(f, "country {country} failed ethical score ({score})")
            }
            Screening::BlockedCompany { symbol, score } => {
                write!(f, "company {symbol} failed ethical score ({score})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EthicalFilter {
    index: CorruptionIndex,
    min_score: u32,
    blocked_segments: BTreeSet<String>,
    blocked_countries: BTreeSet<String>,
    blocked_companies: BTreeSet<String>,
}

impl EthicalFilter {
    pub fn new(index: CorruptionIndex, min_score: u32) -> Self {
        EthicalFilter {
            index,
            min_score,
            blocked_segments: BTreeSet::new(),
            blocked_countries: BTreeSet::new(),
            blocked_companies: BTreeSet::new(),
        }
    }

    pub fn block_segments<I: IntoIterator<Item = String>>(mut self, segments: I) -> Self {
        self.blocked_segments.extend(segments);
        self
    }

    pub fn block_countries<I: IntoIterator<Item = String>>(mut self, countries: I) -> Self {
        self.blocked_countries.extend(countries);
        self
    }

    pub fn block_companies<I: IntoIterator<Item = String>>(mut self, companies: I) -> Self {
        self.blocked_companies.extend(companies);
        self
    }

    pub fn index(&self) -> &CorruptionIndex {
        &self.index
    }

    pub fn min_score(&self) -> u32 {
        self.min_score
    }

    /// Checks segment, then country, then company. An asset with no known
    /// country is scored as a neutral country.
    pub fn screen(&self, asset: &AssetProfile) -> Screening {
        if let Some(segment) = &asset.segment {
            if self.blocked_segments.contains(segment) {
                return Screening::BlockedSegment(segment.clone());
            }
        }

        let country = asset.country.as_deref().unwrap_or("");
        let country_score = self.index.country_score(country);
        if self.blocked_countries.contains(country) || country_score < self.min_score {
            return Screening::BlockedCountry {
                country: country.to_string(),
                score: country_score,
            };
        }

        let company_score = self.index.company_score(&asset.symbol);
        if self.blocked_companies.contains(&asset.symbol) || company_score < self.min_score {
            return Screening::BlockedCompany {
                symbol: asset.symbol.clone(),
                score: company_score,
            };
        }

        Screening::Cleared
    }

    /// Symbols from `symbols` that fail company screening.
    pub fn restricted<'a, I>(&self, symbols: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        symbols
            .into_iter()
            .filter(|s| {
                !self
                    .screen(&AssetProfile {
                        symbol: s.to_string(),
                        ..AssetProfile::default()
                    })
                    .is_allowed()
            })
            .map(str::to_string)
            .collect()
    }
}

impl Default for EthicalFilter {
    fn default() -> Self {
        EthicalFilter::new(CorruptionIndex::default(), DEFAULT_MIN_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(symbol: &str, country: Option<&str>, segment: Option<&str>) -> AssetProfile {
        AssetProfile {
            symbol: symbol.into(),
            country: country.map(str::to_string),
            segment: segment.map(str::to_string),
        }
    }

    #[test]
    fn default_scores() {
        let index = CorruptionIndex::default();
        assert_eq!(index.country_score("Denmark"), 90);
        assert_eq!(index.country_score("Atlantis"), 50);
        assert_eq!(index.company_score("COAL_CORP"), 12);
        assert_eq!(index.company_score("MSFT"), 50);
    }

    #[test]
    fn clean_asset_is_cleared() {
        let filter = EthicalFilter::default();
        assert!(filter.screen(&profile("AAPL", Some("USA"), Some("Tech"))).is_allowed());
        assert!(filter.screen(&profile("MSFT", None, None)).is_allowed());
    }

    #[test]
    fn checks_run_in_order() {
        let filter = EthicalFilter::default().block_segments(["Weapons".to_string()]);
        assert_eq!(
            filter.screen(&profile("WEAPONS_INC", Some("COUNTRY_X"), Some("Weapons"))),
            Screening::BlockedSegment("Weapons".into())
        );
        assert_eq!(
            filter.screen(&profile("WEAPONS_INC", Some("COUNTRY_X"), None)),
            Screening::BlockedCountry {
                country: "COUNTRY_X".into(),
                score: 15
            }
        );
        assert_eq!(
            filter.screen(&profile("WEAPONS_INC", Some("Norway"), None)),
            Screening::BlockedCompany {
                symbol: "WEAPONS_INC".into(),
                score: 20
            }
        );
    }

    #[test]
    fn explicit_blocks_apply_regardless_of_score() {
        let filter = EthicalFilter::default()
            .block_countries(["Denmark".to_string()])
            .block_companies(["AAPL".to_string()]);
        assert!(!filter.screen(&profile("MSFT", Some("Denmark"), None)).is_allowed());
        let blocked = filter.screen(&profile("AAPL", Some("Norway"), None));
        assert!(!blocked.is_allowed());
        assert!(blocked.to_string().contains("company"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let index = CorruptionIndex::default().with_company("EDGE", 40);
        let filter = EthicalFilter::new(index, 40);
        assert!(filter.screen(&profile("EDGE", None, None)).is_allowed());
    }

    #[test]
    fn restricted_list() {
        let filter = EthicalFilter::default();
        assert_eq!(
            filter.restricted(["AAPL", "COAL_CORP", "WEAPONS_INC", "MSFT"]),
            vec!["COAL_CORP".to_string(), "WEAPONS_INC".to_string()]
        );
    }
}
