//! CNPJ (Cadastro Nacional da Pessoa Jurídica) validation and formatting.
//!
//! A CNPJ is 14 digits: 12 identifying digits followed by two check digits,
//! each computed with a weighted modulo-11 sum over the digits before it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of digits in a normalized CNPJ.
pub const CNPJ_LEN: usize = 14;

const FIRST_CHECK_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_CHECK_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Strips every character that is not an ASCII decimal digit.
///
/// `"11.222.333/0001-81"` becomes `"11222333000181"`.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates the format and check digits of a CNPJ.
///
/// Formatting punctuation is ignored. Returns `false` when the normalized
/// value is not exactly 14 digits, when all digits are identical, or when
/// either check digit does not match. Never panics.
///
/// # Arguments
///
/// * `raw` - The CNPJ as typed by the user, with or without the mask.
///
/// # Returns
///
/// * `bool` - `true` only for structurally and arithmetically valid numbers.
pub fn validate_company_id(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != CNPJ_LEN {
        return false;
    }

    // Repeated sequences satisfy the checksum but are never issued
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    if check_digit(&digits[..12], &FIRST_CHECK_WEIGHTS) != digits[12] {
        return false;
    }

    check_digit(&digits[..13], &SECOND_CHECK_WEIGHTS) == digits[13]
}

/// Computes one modulo-11 check digit for `digits` using `weights`.
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Applies the `NN.NNN.NNN/NNNN-NN` mask to whatever digits are present.
///
/// Works on partial input the way an as-you-type form field does: `"112223"`
/// becomes `"11.222.3"`. Digits past the fourteenth are dropped.
pub fn format_cnpj(raw: &str) -> String {
    let digits: String = normalize(raw).chars().take(CNPJ_LEN).collect();
    let mut out = String::with_capacity(18);

    for (i, c) in digits.chars().enumerate() {
        match i {
            2 | 5 => out.push('.'),
            8 => out.push('/'),
            12 => out.push('-'),
            _ => {}
        }
        out.push(c);
    }

    out
}

/// A validated CNPJ, stored as its 14 normalized digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cnpj(String);

impl Cnpj {
    /// Parses and validates `raw`, returning `None` for anything
    /// [`validate_company_id`] rejects.
    pub fn parse(raw: &str) -> Option<Self> {
        if validate_company_id(raw) {
            Some(Self(normalize(raw)))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn formatted(&self) -> String {
        format_cnpj(&self.0)
    }
}

impl fmt::Display for Cnpj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl Serialize for Cnpj {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cnpj {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cnpj::parse(&raw).ok_or_else(|| serde::de::Error::custom("CNPJ inválido"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "11.222.333/0001-81";

    #[test]
    fn test_known_valid_cnpj() {
        assert!(validate_company_id(VALID));
        assert!(validate_company_id("11222333000181"));
    }

    #[test]
    fn test_other_valid_cnpjs() {
        assert!(validate_company_id("45.723.174/0001-10"));
        assert!(validate_company_id("33.000.167/0001-01"));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!validate_company_id(""));
        assert!(!validate_company_id("1122233300018"));
        assert!(!validate_company_id("112223330001811"));
        assert!(!validate_company_id("abc"));
    }

    #[test]
    fn test_repeated_digits_rejected() {
        for d in 0..=9 {
            let repeated = d.to_string().repeat(14);
            assert!(!validate_company_id(&repeated), "{}", repeated);
        }
    }

    #[test]
    fn test_bad_check_digits_rejected() {
        assert!(!validate_company_id("11.222.333/0001-80"));
        assert!(!validate_company_id("11.222.333/0001-91"));
    }

    #[test]
    fn test_check_digit_remainder_below_two_is_zero() {
        // 33.000.167/0001-01: first check digit comes from remainder 0 or 1
        let digits: Vec<u32> = "330001670001".chars().filter_map(|c| c.to_digit(10)).collect();
        assert_eq!(check_digit(&digits, &FIRST_CHECK_WEIGHTS), 0);
    }

    #[test]
    fn test_non_ascii_digits_ignored() {
        // Arabic-Indic digits are not decimal ASCII and must not count
        assert!(!validate_company_id("١١٢٢٢٣٣٣٠٠٠١٨١"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(VALID), "11222333000181");
        assert_eq!(normalize(" 11 222-333 "), "11222333");
    }

    #[test]
    fn test_format_full_and_partial() {
        assert_eq!(format_cnpj("11222333000181"), VALID);
        assert_eq!(format_cnpj("112223"), "11.222.3");
        assert_eq!(format_cnpj("11"), "11");
        assert_eq!(format_cnpj("1122233300018199"), VALID);
        assert_eq!(format_cnpj(""), "");
    }

    #[test]
    fn test_cnpj_newtype() {
        let cnpj = Cnpj::parse(VALID).unwrap();
        assert_eq!(cnpj.as_str(), "11222333000181");
        assert_eq!(cnpj.to_string(), VALID);
        assert!(Cnpj::parse("00000000000000").is_none());
    }

    #[test]
    fn test_cnpj_serde() {
        let cnpj: Cnpj = serde_json::from_str("\"11.222.333/0001-81\"").unwrap();
        assert_eq!(serde_json::to_string(&cnpj).unwrap(), "\"11222333000181\"");
        assert!(serde_json::from_str::<Cnpj>("\"11.222.333/0001-80\"").is_err());
    }
}
