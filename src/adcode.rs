//! Administrative code decomposition.
//!
//! An adcode encodes its ancestors as prefixes: two digits for the
//! province, four for the city, six for the county, nine for the township
//! and twelve for the village. Trailing zeros mean "not specified".

use std::collections::BTreeMap;

use crate::models::{AdminLevel, COUNTRY_ADCODE};

/// Ancestor codes of an adcode, keyed by level. Country is always present.
pub type AdcodeLevels = BTreeMap<AdminLevel, String>;

/// Group boundaries used once the significant part is longer than six digits.
const LONG_BOUNDARIES: [usize; 5] = [2, 4, 6, 9, 12];
const SHORT_BOUNDARIES: [usize; 3] = [2, 4, 6];

/// Canonical padded length of a code at a level.
pub fn canonical_len(level: AdminLevel) -> usize {
    match level {
        AdminLevel::Township => 9,
        AdminLevel::Village => 12,
        _ => 6,
    }
}

/// Strip trailing zeros, leaving the significant prefix.
pub fn significant(code: &str) -> &str {
    code.trim().trim_end_matches('0')
}

/// Pad a code prefix with zeros to the canonical length of `level`.
pub fn pad(prefix: &str, level: AdminLevel) -> String {
    format!("{:0<width$}", prefix, width = canonical_len(level))
}

/// Decompose an adcode into the codes of every level it names.
///
/// The result is identical for codes that differ only in trailing zeros.
/// Input that is not purely ASCII digits yields the country level only.
///
/// ```
/// use regionfill::adcode::decompose;
/// use regionfill::AdminLevel;
///
/// let levels = decompose("310101001");
/// assert_eq!(levels[&AdminLevel::County], "310101");
/// assert_eq!(levels[&AdminLevel::Township], "310101001");
/// assert!(!levels.contains_key(&AdminLevel::Village));
/// ```
pub fn decompose(code: &str) -> AdcodeLevels {
    let mut levels = AdcodeLevels::new();
    levels.insert(AdminLevel::Country, COUNTRY_ADCODE.to_string());

    let stripped = significant(code);
    if !stripped.bytes().all(|b| b.is_ascii_digit()) {
        return levels;
    }

    let len = stripped.len();
    let (boundaries, group): (&[usize], usize) = if len > 6 {
        (&LONG_BOUNDARIES, 3)
    } else {
        (&SHORT_BOUNDARIES, 2)
    };
    let valid_len = len.div_ceil(group) * group;

    for &boundary in boundaries.iter().take_while(|b| **b <= valid_len) {
        let Some(level) = AdminLevel::from_significant_digits(boundary) else {
            continue;
        };
        let prefix = &stripped[..boundary.min(len)];
        levels.insert(level, pad(prefix, level));
    }

    levels
}

/// The level an adcode identifies: the deepest level of its decomposition.
pub fn level_of(code: &str) -> AdminLevel {
    decompose(code)
        .keys()
        .next_back()
        .copied()
        .unwrap_or(AdminLevel::Country)
}

/// The level directly above `level`; `None` for country.
pub fn parent_level(level: AdminLevel) -> Option<AdminLevel> {
    level.parent()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(levels: &AdcodeLevels) -> Vec<(&'static str, &str)> {
        levels
            .iter()
            .map(|(l, c)| (l.field_name(), c.as_str()))
            .collect()
    }

    #[test]
    fn test_township_code() {
        let levels = decompose("310101001");
        assert_eq!(
            codes(&levels),
            vec![
                ("country", "000000"),
                ("province", "310000"),
                ("city", "310100"),
                ("county", "310101"),
                ("township", "310101001"),
            ]
        );
    }

    #[test]
    fn test_province_code() {
        let levels = decompose("310000");
        assert_eq!(
            codes(&levels),
            vec![("country", "000000"), ("province", "310000")]
        );
    }

    #[test]
    fn test_trailing_zeros_are_ignored() {
        let base = decompose("3101");
        for code in ["310100", "310100000", "310100000000"] {
            assert_eq!(decompose(code), base, "{code}");
        }
        assert_eq!(decompose("310101001"), decompose("310101001000"));
    }

    #[test]
    fn test_village_code() {
        let levels = decompose("310101001002");
        assert_eq!(levels[&AdminLevel::Township], "310101001");
        assert_eq!(levels[&AdminLevel::Village], "310101001002");
    }

    #[test]
    fn test_odd_length_rounds_up() {
        let levels = decompose("3101011");
        assert_eq!(levels[&AdminLevel::Township], "310101100");

        let levels = decompose("311");
        assert_eq!(levels[&AdminLevel::City], "311000");
    }

    #[test]
    fn test_country_only() {
        for code in ["000000", "", "abc"] {
            let levels = decompose(code);
            assert_eq!(levels.len(), 1);
            assert_eq!(levels[&AdminLevel::Country], "000000");
        }
    }

    #[test]
    fn test_level_of() {
        assert_eq!(level_of("310000"), AdminLevel::Province);
        assert_eq!(level_of("310101"), AdminLevel::County);
        assert_eq!(level_of("310101001000"), AdminLevel::Township);
        assert_eq!(level_of("000000"), AdminLevel::Country);
        assert_eq!(parent_level(AdminLevel::Province), Some(AdminLevel::Country));
    }
}
