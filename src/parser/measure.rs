use anyhow::{Context, Result};
use regex::Regex;

use super::{ParserConfig, PlausibleRange};

/// The measurement strategies, in the order they are consulted. Each field is
/// set at most once; a later strategy only fills fields still unset.
const CASCADE: [MeasureRule; 5] = [
    MeasureRule::Labeled,
    MeasureRule::UnitSingle,
    MeasureRule::UnitPair,
    MeasureRule::DelimitedPair,
    MeasureRule::Scan,
];

#[derive(Debug, Clone, Copy)]
enum MeasureRule {
    Labeled,
    UnitSingle,
    UnitPair,
    DelimitedPair,
    Scan,
}

/// Finds height (см) and weight (кг) in the scoped text. Every candidate
/// number passes the plausibility-range gate; out-of-range numbers are never
/// surfaced.
pub struct MeasureExtractor {
    height_label: Regex,
    weight_label: Regex,
    height_unit: Regex,
    weight_unit: Regex,
    unit_pair: Regex,
    delimited_pair: Regex,
    number: Regex,
    height_range: PlausibleRange,
    weight_range: PlausibleRange,
}

impl MeasureExtractor {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            height_label: Regex::new(r"(?i)\bРост\s*[:\-]?\s*(\d{2,3})\b")
                .context("height label pattern")?,
            weight_label: Regex::new(r"(?i)\bВес\s*[:\-]?\s*(\d{2,3})\b")
                .context("weight label pattern")?,
            height_unit: Regex::new(r"(?i)\b(\d{2,3})\s*см\b").context("height unit pattern")?,
            weight_unit: Regex::new(r"(?i)\b(\d{2,3})\s*кг\b").context("weight unit pattern")?,
            unit_pair: Regex::new(r"(?i)\b(\d{2,3})\s*см\b\s*[,;]?\s*(\d{2,3})\s*кг\b")
                .context("unit pair pattern")?,
            delimited_pair: Regex::new(r"\b(\d{2,3})(?:\s*[/,\-]\s*|\s+)(\d{2,3})\b")
                .context("delimited pair pattern")?,
            number: Regex::new(r"\b\d{2,3}\b").context("number pattern")?,
            height_range: config.height_range,
            weight_range: config.weight_range,
        })
    }

    /// Returns (weight_kg, height_cm).
    pub fn extract(&self, text: &str) -> (Option<f64>, Option<f64>) {
        let mut weight: Option<f64> = None;
        let mut height: Option<f64> = None;

        for rule in CASCADE {
            if weight.is_some() && height.is_some() {
                break;
            }
            self.apply(rule, text, &mut weight, &mut height);
        }

        (weight, height)
    }

    fn apply(
        &self,
        rule: MeasureRule,
        text: &str,
        weight: &mut Option<f64>,
        height: &mut Option<f64>,
    ) {
        match rule {
            MeasureRule::Labeled => {
                if height.is_none() {
                    *height = self.captured_in_range(&self.height_label, text, self.height_range);
                }
                if weight.is_none() {
                    *weight = self.captured_in_range(&self.weight_label, text, self.weight_range);
                }
            }
            MeasureRule::UnitSingle => {
                if height.is_none() {
                    *height = self.captured_in_range(&self.height_unit, text, self.height_range);
                }
                if weight.is_none() {
                    *weight = self.captured_in_range(&self.weight_unit, text, self.weight_range);
                }
            }
            MeasureRule::UnitPair => {
                if let Some(captures) = self.unit_pair.captures(text) {
                    let h = parse_number(&captures[1]);
                    let w = parse_number(&captures[2]);
                    // Both members must be plausible for the pair to count.
                    if self.height_range.contains(h) && self.weight_range.contains(w) {
                        if height.is_none() {
                            *height = Some(f64::from(h));
                        }
                        if weight.is_none() {
                            *weight = Some(f64::from(w));
                        }
                    }
                }
            }
            MeasureRule::DelimitedPair => {
                if let Some(captures) = self.delimited_pair.captures(text) {
                    let a = parse_number(&captures[1]);
                    let b = parse_number(&captures[2]);
                    if let Some((h, w)) = self.disambiguate_pair(a, b) {
                        if height.is_none() {
                            *height = Some(f64::from(h));
                        }
                        if weight.is_none() {
                            *weight = Some(f64::from(w));
                        }
                    }
                }
            }
            MeasureRule::Scan => {
                for m in self.number.find_iter(text) {
                    if height.is_some() && weight.is_some() {
                        break;
                    }
                    let value = parse_number(m.as_str());
                    // Independent scans: the same number may serve both
                    // fields when both are still open.
                    if height.is_none() && self.height_range.contains(value) {
                        *height = Some(f64::from(value));
                    }
                    if weight.is_none() && self.weight_range.contains(value) {
                        *weight = Some(f64::from(value));
                    }
                }
            }
        }
    }

    /// Resolves which member of a delimited pair is the height. When only one
    /// ordering is range-plausible, it wins; when both are (the height range
    /// sits inside the weight range, so this is common), the larger number is
    /// the height; when neither is, the pair is discarded.
    fn disambiguate_pair(&self, a: u32, b: u32) -> Option<(u32, u32)> {
        let forward = self.height_range.contains(a) && self.weight_range.contains(b);
        let reverse = self.height_range.contains(b) && self.weight_range.contains(a);
        match (forward, reverse) {
            (true, false) => Some((a, b)),
            (false, true) => Some((b, a)),
            (true, true) => Some((a.max(b), a.min(b))),
            (false, false) => None,
        }
    }

    fn captured_in_range(&self, pattern: &Regex, text: &str, range: PlausibleRange) -> Option<f64> {
        let captures = pattern.captures(text)?;
        let value = parse_number(&captures[1]);
        range.contains(value).then(|| f64::from(value))
    }
}

fn parse_number(digits: &str) -> u32 {
    // The patterns only capture 2-3 ASCII digits.
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> MeasureExtractor {
        MeasureExtractor::new(&ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_labeled_fields() {
        let e = extractor();
        assert_eq!(e.extract("Рост: 176, Вес :125"), (Some(125.0), Some(176.0)));
        assert_eq!(e.extract("рост 180 вес 90"), (Some(90.0), Some(180.0)));
    }

    #[test]
    fn test_labeled_out_of_range_is_discarded() {
        let e = extractor();
        assert_eq!(e.extract("Рост: 999 Вес: 500"), (None, None));
    }

    #[test]
    fn test_unit_suffixed_singles() {
        let e = extractor();
        // The unit rule sets height; the unlabeled scan then reuses 150 for
        // the still-open weight (rule-5 imprecision).
        assert_eq!(e.extract("150 см"), (Some(150.0), Some(150.0)));
        assert_eq!(e.extract("80 кг"), (Some(80.0), None));
        assert_eq!(e.extract("999 см"), (None, None));
    }

    #[test]
    fn test_labeled_overrides_units() {
        let e = extractor();
        // "55 кг" appears, but the label already fixed the weight.
        assert_eq!(
            e.extract("Вес 90 и ещё 55 кг 176 см"),
            (Some(90.0), Some(176.0))
        );
    }

    #[test]
    fn test_adjacent_unit_pair() {
        let e = extractor();
        assert_eq!(e.extract("176 см, 125 кг"), (Some(125.0), Some(176.0)));
        assert_eq!(e.extract("176 см 125 кг"), (Some(125.0), Some(176.0)));
    }

    #[test]
    fn test_delimited_pair_forward() {
        let e = extractor();
        assert_eq!(e.extract("параметры 176/125"), (Some(125.0), Some(176.0)));
    }

    #[test]
    fn test_delimited_pair_swaps_by_range() {
        let e = extractor();
        assert_eq!(e.extract("параметры 125/176"), (Some(125.0), Some(176.0)));
    }

    #[test]
    fn test_delimited_pair_unambiguous_reverse() {
        let e = extractor();
        // 95 is below the height range, so only the reverse ordering fits.
        assert_eq!(e.extract("95-176"), (Some(95.0), Some(176.0)));
    }

    #[test]
    fn test_delimited_pair_neither_plausible() {
        let e = extractor();
        assert_eq!(e.extract("10/12"), (None, None));
    }

    #[test]
    fn test_unlabeled_scan_fallback() {
        let e = extractor();
        // 40 is weight-only, 176 is the first height-range number.
        assert_eq!(e.extract("лида зовут 40 и 176"), (Some(40.0), Some(176.0)));
    }

    #[test]
    fn test_scan_may_reuse_one_number_for_both() {
        let e = extractor();
        // 150 satisfies both ranges; documented imprecision of the fallback.
        assert_eq!(e.extract("число 150 одно"), (Some(150.0), Some(150.0)));
    }

    #[test]
    fn test_labeled_beats_earlier_unlabeled_number() {
        let e = extractor();
        assert_eq!(e.extract("140 слов Рост: 176"), (Some(140.0), Some(176.0)));
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let e = extractor();
        assert_eq!(e.extract("Рост 120 Вес 300"), (Some(300.0), Some(120.0)));
        assert_eq!(e.extract("Рост 220 Вес 35"), (Some(35.0), Some(220.0)));
        assert_eq!(e.extract("Рост 310 Вес 34"), (None, None));
    }

    #[test]
    fn test_empty() {
        let e = extractor();
        assert_eq!(e.extract(""), (None, None));
    }
}
