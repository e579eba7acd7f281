use std::collections::BTreeSet;
use std::fmt;

use super::reference::ReferenceGroup;
use crate::error::{Error, Result};

/// Threshold for both warning policies
const STRENGTH_LIMIT: f64 = 1.0;

/// Warnings raised after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrengthWarning {
    /// Some strength is above 1.0 in absolute value
    LargeValue,
    /// Absolute strengths add up to less than 1.0
    SmallTotal,
}

impl StrengthWarning {
    pub fn message(self) -> &'static str {
        match self {
            StrengthWarning::LargeValue => "Warning: a reference strength exceeds 1.0",
            StrengthWarning::SmallTotal => "Warning: reference strengths add up to less than 1.0",
        }
    }
}

impl fmt::Display for StrengthWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// New strengths for a whole group plus the warnings they trigger
#[derive(Debug, Clone, PartialEq)]
pub struct Redistribution {
    pub values: Vec<f64>,
    pub warnings: BTreeSet<StrengthWarning>,
}

impl Redistribution {
    /// The single warning a one-line status display shows. The small
    /// total check runs last, so it wins when both fire.
    pub fn displayed(&self) -> Option<StrengthWarning> {
        if self.warnings.contains(&StrengthWarning::SmallTotal) {
            Some(StrengthWarning::SmallTotal)
        } else if self.warnings.contains(&StrengthWarning::LargeValue) {
            Some(StrengthWarning::LargeValue)
        } else {
            None
        }
    }
}

/// Rescale every strength after member `edited` is set to `new_value`.
///
/// Ratios are taken against the originally loaded strengths, so repeated
/// edits never compound. A zero base strength makes every other member zero.
pub fn redistribute(originals: &[f64], edited: usize, new_value: f64) -> Result<Redistribution> {
    let base = *originals
        .get(edited)
        .ok_or(Error::MemberOutOfRange { index: edited, len: originals.len() })?;

    let values: Vec<f64> = originals
        .iter()
        .enumerate()
        .map(|(j, &original)| {
            if j == edited {
                new_value
            } else {
                let ratio = if base == 0.0 { 0.0 } else { original / base };
                new_value * ratio
            }
        })
        .collect();

    let mut warnings = BTreeSet::new();
    if values.iter().any(|v| v.abs() > STRENGTH_LIMIT) {
        warnings.insert(StrengthWarning::LargeValue);
    }
    let total: f64 = values.iter().map(|v| v.abs()).sum();
    if total < STRENGTH_LIMIT {
        warnings.insert(StrengthWarning::SmallTotal);
    }

    Ok(Redistribution { values, warnings })
}

/// Strengths are shown with eight decimals
pub fn format_strength(value: f64) -> String {
    format!("{:.8}", value)
}

impl ReferenceGroup {
    /// Set member `edited` to `new_value` and rescale the others.
    pub fn apply(&mut self, edited: usize, new_value: f64) -> Result<Redistribution> {
        let outcome = redistribute(&self.original_strengths(), edited, new_value)?;
        for (member, value) in self.members.iter_mut().zip(&outcome.values) {
            member.strength = *value;
        }
        Ok(outcome)
    }

    /// Apply a typed strength. Text that is not a number changes nothing
    /// and yields `Ok(None)`.
    pub fn apply_input(&mut self, edited: usize, text: &str) -> Result<Option<Redistribution>> {
        let Ok(new_value) = text.trim().parse::<f64>() else {
            return Ok(None);
        };
        self.apply(edited, new_value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potion::reference::PotionReference;
    use crate::state::index::EncodingIndex;

    fn group(strengths: &[f64]) -> ReferenceGroup {
        let refs = strengths
            .iter()
            .enumerate()
            .map(|(i, &strength)| PotionReference { encoding: format!("enc-{}", i), strength })
            .collect();
        ReferenceGroup::resolve(refs, &EncodingIndex::new())
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_equal_siblings_follow_edit() {
        let outcome = redistribute(&[0.5, 0.5], 0, 0.8).unwrap();
        assert_close(&outcome.values, &[0.8, 0.8]);
    }

    #[test]
    fn test_zero_sibling_stays_zero() {
        let outcome = redistribute(&[1.0, 0.0], 0, 0.5).unwrap();
        assert_close(&outcome.values, &[0.5, 0.0]);
    }

    #[test]
    fn test_zero_base_zeroes_others() {
        let outcome = redistribute(&[0.0, 0.4, 0.6], 0, 0.9).unwrap();
        assert_close(&outcome.values, &[0.9, 0.0, 0.0]);
    }

    #[test]
    fn test_ratios_are_preserved() {
        let outcome = redistribute(&[0.2, 0.4, 0.1], 1, 0.8).unwrap();
        assert_close(&outcome.values, &[0.4, 0.8, 0.2]);
    }

    #[test]
    fn test_small_total_warning() {
        let outcome = redistribute(&[0.3, 0.3], 0, 0.3).unwrap();
        assert_eq!(outcome.warnings, BTreeSet::from([StrengthWarning::SmallTotal]));
        assert_eq!(outcome.displayed(), Some(StrengthWarning::SmallTotal));
    }

    #[test]
    fn test_no_warning_when_total_reaches_one() {
        let outcome = redistribute(&[0.6, 0.6], 0, 0.6).unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.displayed(), None);
    }

    #[test]
    fn test_large_value_from_edit_or_sibling() {
        let edited = redistribute(&[0.5, 0.5], 0, 1.5).unwrap();
        assert!(edited.warnings.contains(&StrengthWarning::LargeValue));

        let sibling = redistribute(&[0.2, 0.8], 0, 0.5).unwrap();
        assert_close(&sibling.values, &[0.5, 2.0]);
        assert_eq!(sibling.warnings, BTreeSet::from([StrengthWarning::LargeValue]));

        let negative = redistribute(&[0.5, 0.5], 0, -1.2).unwrap();
        assert!(negative.warnings.contains(&StrengthWarning::LargeValue));
    }

    #[test]
    fn test_single_member_group() {
        let outcome = redistribute(&[1.0], 0, 0.5).unwrap();
        assert_close(&outcome.values, &[0.5]);
        assert_eq!(outcome.warnings, BTreeSet::from([StrengthWarning::SmallTotal]));
    }

    #[test]
    fn test_displayed_prefers_small_total() {
        let both = Redistribution {
            values: vec![],
            warnings: BTreeSet::from([StrengthWarning::LargeValue, StrengthWarning::SmallTotal]),
        };
        assert_eq!(both.displayed(), Some(StrengthWarning::SmallTotal));
    }

    #[test]
    fn test_out_of_range_member() {
        assert!(matches!(
            redistribute(&[0.5], 3, 0.5),
            Err(Error::MemberOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_group_edits_use_original_base() {
        let mut g = group(&[0.5, 0.25]);
        g.apply(0, 1.0).unwrap();
        assert_close(&g.strengths(), &[1.0, 0.5]);

        // second edit still scales from the loaded 0.5, not from 1.0
        g.apply(0, 0.5).unwrap();
        assert_close(&g.strengths(), &[0.5, 0.25]);

        g.apply(1, 0.5).unwrap();
        assert_close(&g.strengths(), &[1.0, 0.5]);
    }

    #[test]
    fn test_non_numeric_input_is_ignored() {
        let mut g = group(&[0.5, 0.5]);
        g.apply(0, 0.7).unwrap();
        assert_eq!(g.apply_input(0, "abc").unwrap(), None);
        assert_eq!(g.apply_input(0, "").unwrap(), None);
        assert_close(&g.strengths(), &[0.7, 0.7]);

        let outcome = g.apply_input(1, " 0.9 ").unwrap().unwrap();
        assert_close(&outcome.values, &[0.9, 0.9]);
    }

    #[test]
    fn test_format_strength() {
        assert_eq!(format_strength(0.8), "0.80000000");
        assert_eq!(format_strength(1.0 / 3.0), "0.33333333");
    }
}
