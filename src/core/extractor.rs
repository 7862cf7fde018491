use crate::core::vocabulary::{normalize, CompiledVocabulary};
use crate::models::{Extracted, RequirementVector, Utterance};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

/// Turns one utterance into a partial requirement vector.
///
/// Implementations never fail: anything they cannot interpret is left unset,
/// so the worst case is an empty vector. Every strategy must report a
/// confidence in [0, 1] for each field it populates.
pub trait RequirementExtractor: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    fn extract(&self, utterance: &Utterance) -> RequirementVector;
}

// Confidence assigned to each kind of cue
const QUALIFIED_SIZE: f64 = 0.95;
const EXPLICIT_SIZE: f64 = 0.9;
const INFERRED_RANGE: f64 = 0.75;
const APPROXIMATE_SIZE: f64 = 0.8;
const HEADCOUNT_SIZE: f64 = 0.6;
const MONTHLY_BUDGET: f64 = 0.9;
const ANNUAL_BUDGET: f64 = 0.85;
const CUED_BUDGET: f64 = 0.7;
const RATE_WITH_SIZE: f64 = 0.7;
const RATE_WITH_REFERENCE: f64 = 0.5;
const BARE_BUDGET: f64 = 0.5;
const LEASE_TERM: f64 = 0.85;
const GAZETTEER_NAME: f64 = 0.9;
const GAZETTEER_ALIAS: f64 = 0.75;
const FREE_TEXT_LOCATION: f64 = 0.4;
const AMENITY: f64 = 0.8;
const CULTURE: f64 = 0.7;

const AMOUNT: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?";
const SQFT_UNIT: &str = r"(?:square\s+(?:feet|foot|ft)|sq\.?\s*(?:feet|ft)|sqft|sf)\b";
const NUMBER_WORD: &str =
    r"\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|eighteen|twenty[\s-]four|thirty[\s-]six";
const TERM_UNIT: &str = r"years?|yrs?|months?|mos?";

/// Tunable constants of the rule-based strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Lower bound of floor space per head when sizing from a team size
    #[serde(default = "default_sqft_per_person_min")]
    pub sqft_per_person_min: u32,
    #[serde(default = "default_sqft_per_person_max")]
    pub sqft_per_person_max: u32,
    /// Size used to turn a per-square-foot rate into monthly rent when the
    /// utterance gives no footage
    #[serde(default = "default_reference_sqft")]
    pub reference_sqft: u32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            sqft_per_person_min: default_sqft_per_person_min(),
            sqft_per_person_max: default_sqft_per_person_max(),
            reference_sqft: default_reference_sqft(),
        }
    }
}

fn default_sqft_per_person_min() -> u32 { 100 }
fn default_sqft_per_person_max() -> u32 { 200 }
fn default_reference_sqft() -> u32 { 2000 }

struct Patterns {
    sqft_range: Regex,
    sqft_single: Regex,
    headcount: Regex,
    money: Regex,
    budget_cue: Regex,
    lease_after: Regex,
    lease_before: Regex,
    free_location: Regex,
    negation: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            sqft_range: Regex::new(&format!(
                r"\b(?:(?P<between>between)\s+)?(?P<lo>{AMOUNT})\s*(?P<lok>k)?\s*(?P<sep>-|to|and)\s*(?P<hi>{AMOUNT})\s*(?P<hik>k)?\s*{SQFT_UNIT}"
            ))?,
            sqft_single: Regex::new(&format!(
                r"(?:\b(?P<lower>at\s+least|minimum(?:\s+of)?|min\.?|over|more\s+than|no\s+less\s+than)|\b(?P<upper>up\s+to|at\s+most|maximum(?:\s+of)?|max\.?|under|less\s+than|no\s+more\s+than)|\b(?P<approx>about|around|roughly|approximately|approx\.?))?\s*\b(?P<n>{AMOUNT})\s*(?P<k>k)?\s*{SQFT_UNIT}"
            ))?,
            headcount: Regex::new(
                r"\bteam\s+of\s+(?P<team>\d+)\b|\b(?P<n>\d+)[\s-]*(?:people|persons|person\s+team|employees|staff|desks|seats|workstations)\b",
            )?,
            money: Regex::new(&format!(
                r"(?:\$\s*(?P<amt>{AMOUNT})\s*(?P<k>k\b|thousand\b)?|\b(?P<amt2>{AMOUNT})\s*(?P<k2>k\b|thousand\b)?\s*(?:dollars|usd|bucks)\b)\s*(?:(?:per|a|an|/|each|every)\s*(?P<month>month|mo)\b|(?P<monthly>monthly)\b|(?:per|a|an|/|each|every)\s*(?P<year>year|yr|annum)\b|(?P<yearly>annually|yearly|annual)\b|(?:per|a|/)\s*(?P<rate>sq\.?\s*ft|sqft|square\s+(?:foot|feet)|sf)\b|(?P<psf>psf)\b)?"
            ))?,
            budget_cue: Regex::new(
                r"\b(?:budget|under|below|max(?:imum)?|up\s+to|no\s+more\s+than|less\s+than|at\s+most|around|about|afford|spend|pay|cap|ceiling)\b",
            )?,
            lease_after: Regex::new(&format!(
                r"\b(?P<n>{NUMBER_WORD})[\s-]*(?P<unit>{TERM_UNIT})\b[\s-]*(?:long\s+)?(?:lease|term|commitment)\b"
            ))?,
            lease_before: Regex::new(&format!(
                r"\b(?:lease|term|commitment)\s+(?:of|for|length\s+of)\s+(?:about\s+|around\s+)?(?P<n>{NUMBER_WORD})[\s-]*(?P<unit>{TERM_UNIT})\b"
            ))?,
            free_location: Regex::new(
                r"\b(?:in|near|around|close\s+to)\s+(?:the\s+)?(?P<place>[a-z][a-z'\-]*(?:\s+[a-z][a-z'\-]*){0,3})\s+(?:area|neighborhood|neighbourhood|district)\b",
            )?,
            negation: Regex::new(r"\b(?:no|without|not|don't|dont|won't)\b(?:\s+\w+){0,2}\s*$")?,
        })
    }
}

/// Pattern and keyword extraction over a controlled vocabulary
pub struct RuleBasedExtractor {
    vocabulary: Arc<CompiledVocabulary>,
    rules: RuleConfig,
    patterns: Patterns,
}

impl RuleBasedExtractor {
    pub fn new(vocabulary: Arc<CompiledVocabulary>, rules: RuleConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            vocabulary,
            rules,
            patterns: Patterns::compile()?,
        })
    }

    fn extract_sqft(&self, text: &str, out: &mut RequirementVector) {
        let mut claimed: Vec<Range<usize>> = Vec::new();

        for caps in self.patterns.sqft_range.captures_iter(text) {
            let (Some(lo), Some(hi)) = (parse_amount(caps.name("lo").map(|m| m.as_str()), None), parse_amount(caps.name("hi").map(|m| m.as_str()), None)) else {
                continue;
            };
            // Without "between", "x and y sqft" is two separate facts ("team of 15 and 2000 sqft")
            if caps.name("sep").is_some_and(|m| m.as_str() == "and") && caps.name("between").is_none() {
                continue;
            }

            let hi_k = caps.name("hik").is_some();
            let lo = if caps.name("lok").is_some() || (hi_k && lo < 1000.0) { lo * 1000.0 } else { lo };
            let hi = if hi_k { hi * 1000.0 } else { hi };
            // "2-3,000 sqft" shares the upper bound's magnitude
            let (lo, confidence) = match shared_magnitude(lo, hi) {
                Some(scaled) => (scaled, INFERRED_RANGE),
                None => (lo, QUALIFIED_SIZE),
            };
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };

            out.merge(&RequirementVector {
                sqft_min: Some(Extracted::new(lo.round() as u32, confidence)),
                sqft_max: Some(Extracted::new(hi.round() as u32, confidence)),
                ..Default::default()
            });
            if let Some(m) = caps.get(0) {
                claimed.push(m.range());
            }
        }

        for caps in self.patterns.sqft_single.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if claimed.iter().any(|r| overlaps(r, &whole.range())) {
                continue;
            }
            let Some(size) = parse_amount(caps.name("n").map(|m| m.as_str()), caps.name("k").map(|m| m.as_str())) else {
                continue;
            };
            if size < 1.0 {
                continue;
            }
            let size_u = size.round() as u32;

            let candidate = if caps.name("upper").is_some() {
                RequirementVector { sqft_max: Some(Extracted::new(size_u, QUALIFIED_SIZE)), ..Default::default() }
            } else if caps.name("lower").is_some() {
                RequirementVector { sqft_min: Some(Extracted::new(size_u, QUALIFIED_SIZE)), ..Default::default() }
            } else if caps.name("approx").is_some() {
                RequirementVector {
                    sqft_min: Some(Extracted::new((size * 0.9).round() as u32, APPROXIMATE_SIZE)),
                    sqft_max: Some(Extracted::new((size * 1.1).round() as u32, APPROXIMATE_SIZE)),
                    ..Default::default()
                }
            } else {
                RequirementVector { sqft_min: Some(Extracted::new(size_u, EXPLICIT_SIZE)), ..Default::default() }
            };
            out.merge(&candidate);
        }
    }

    fn extract_headcount(&self, text: &str, out: &mut RequirementVector) {
        for caps in self.patterns.headcount.captures_iter(text) {
            let heads = caps
                .name("team")
                .or_else(|| caps.name("n"))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|n| *n > 0);
            let Some(heads) = heads else { continue };

            out.merge(&RequirementVector {
                sqft_min: Some(Extracted::new(heads.saturating_mul(self.rules.sqft_per_person_min), HEADCOUNT_SIZE)),
                sqft_max: Some(Extracted::new(heads.saturating_mul(self.rules.sqft_per_person_max), HEADCOUNT_SIZE)),
                ..Default::default()
            });
        }
    }

    fn extract_budget(&self, text: &str, out: &mut RequirementVector) {
        let size_hint = out
            .sqft_max
            .as_ref()
            .or(out.sqft_min.as_ref())
            .map(|f| f.value)
            .filter(|s| *s > 0);

        for caps in self.patterns.money.captures_iter(text) {
            let amount = parse_amount(
                caps.name("amt").or_else(|| caps.name("amt2")).map(|m| m.as_str()),
                caps.name("k").or_else(|| caps.name("k2")).map(|m| m.as_str()),
            );
            let Some(amount) = amount.filter(|a| *a > 0.0) else { continue };

            let (monthly, confidence) = if has_any(&caps, &["month", "monthly"]) {
                (amount, MONTHLY_BUDGET)
            } else if has_any(&caps, &["year", "yearly"]) {
                (amount / 12.0, ANNUAL_BUDGET)
            } else if has_any(&caps, &["rate", "psf"]) {
                match size_hint {
                    Some(size) => (amount * size as f64 / 12.0, RATE_WITH_SIZE),
                    None => (amount * self.rules.reference_sqft as f64 / 12.0, RATE_WITH_REFERENCE),
                }
            } else if self.has_budget_cue(text, caps.get(0).map_or(0, |m| m.start())) {
                (amount, CUED_BUDGET)
            } else {
                (amount, BARE_BUDGET)
            };

            out.merge(&RequirementVector {
                budget_max: Some(Extracted::new((monthly * 100.0).round() / 100.0, confidence)),
                ..Default::default()
            });
        }
    }

    fn has_budget_cue(&self, text: &str, start: usize) -> bool {
        let window: Vec<&str> = text[..start].split_whitespace().rev().take(6).collect();
        let window: Vec<&str> = window.into_iter().rev().collect();
        self.patterns.budget_cue.is_match(&window.join(" "))
    }

    fn extract_lease(&self, text: &str, out: &mut RequirementVector) {
        let matches = self
            .patterns
            .lease_after
            .captures_iter(text)
            .chain(self.patterns.lease_before.captures_iter(text));

        for caps in matches {
            let count = caps.name("n").and_then(|m| parse_number_word(m.as_str()));
            let unit = caps.name("unit").map(|m| m.as_str()).unwrap_or_default();
            let Some(count) = count.filter(|n| *n > 0) else { continue };

            let months = if unit.starts_with('y') { count.saturating_mul(12) } else { count };
            out.merge(&RequirementVector {
                lease_term_months: Some(Extracted::new(months, LEASE_TERM)),
                ..Default::default()
            });
        }
    }

    fn extract_location(&self, text: &str, out: &mut RequirementVector) {
        for hit in self.vocabulary.find_locations(text) {
            let confidence = if hit.by_alias { GAZETTEER_ALIAS } else { GAZETTEER_NAME };
            out.merge(&RequirementVector {
                location: Some(Extracted::new(hit.entry.name.clone(), confidence)),
                ..Default::default()
            });
        }

        for caps in self.patterns.free_location.captures_iter(text) {
            if let Some(place) = caps.name("place") {
                out.merge(&RequirementVector {
                    location: Some(Extracted::new(place.as_str().to_string(), FREE_TEXT_LOCATION)),
                    ..Default::default()
                });
            }
        }
    }

    fn extract_amenities(&self, text: &str, out: &mut RequirementVector) {
        let wanted: BTreeSet<String> = self
            .vocabulary
            .find_amenities(text)
            .into_iter()
            .filter(|hit| !self.patterns.negation.is_match(&text[..hit.start]))
            .map(|hit| hit.entry.name.clone())
            .collect();

        if !wanted.is_empty() {
            out.merge(&RequirementVector {
                amenities: Some(Extracted::new(wanted, AMENITY)),
                ..Default::default()
            });
        }
    }

    fn extract_culture(&self, text: &str, out: &mut RequirementVector) {
        let wanted: BTreeSet<String> = self
            .vocabulary
            .find_culture(text)
            .into_iter()
            .filter(|hit| !self.patterns.negation.is_match(&text[..hit.start]))
            .map(|hit| hit.entry.name.clone())
            .collect();

        if !wanted.is_empty() {
            out.merge(&RequirementVector {
                culture: Some(Extracted::new(wanted, CULTURE)),
                ..Default::default()
            });
        }
    }
}

impl RequirementExtractor for RuleBasedExtractor {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn extract(&self, utterance: &Utterance) -> RequirementVector {
        let text = normalize(&utterance.text);
        let mut out = RequirementVector::default();
        if text.is_empty() {
            return out;
        }

        // Footage first: budget rates and headcount both consult it
        self.extract_sqft(&text, &mut out);
        self.extract_headcount(&text, &mut out);
        self.extract_budget(&text, &mut out);
        self.extract_lease(&text, &mut out);
        self.extract_location(&text, &mut out);
        self.extract_amenities(&text, &mut out);
        self.extract_culture(&text, &mut out);
        out
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Lower bound of a range written with a shortened first number, scaled to the
/// upper bound's magnitude. `None` when the bound stands as written.
fn shared_magnitude(lo: f64, hi: f64) -> Option<f64> {
    if hi < 1000.0 || lo < 1.0 || lo >= 100.0 {
        return None;
    }
    let digits = |v: f64| v.trunc().log10().floor() as i32;
    let scaled = lo * 10f64.powi(digits(hi) - digits(lo));
    Some(if scaled > hi { scaled / 10.0 } else { scaled })
}

fn has_any(caps: &Captures<'_>, names: &[&str]) -> bool {
    names.iter().any(|name| caps.name(name).is_some())
}

/// Parse "3,000", "2.5" with an optional "k"/"thousand" multiplier
fn parse_amount(digits: Option<&str>, multiplier: Option<&str>) -> Option<f64> {
    let value: f64 = digits?.replace(',', "").parse().ok()?;
    let value = match multiplier {
        Some(_) => value * 1000.0,
        None => value,
    };
    value.is_finite().then_some(value)
}

fn parse_number_word(word: &str) -> Option<u32> {
    if let Ok(n) = word.parse::<u32>() {
        return Some(n);
    }
    let compact: String = word.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    let n = match compact.as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "eighteen" => 18,
        "twentyfour" => 24,
        "thirtysix" => 36,
        _ => return None,
    };
    Some(n)
}
