/// Property-based tests using proptest
/// Invariants of the CNPJ validator and the rating aggregator
use agentdex_api::cnpj::{format_cnpj, normalize, validate_company_id, Cnpj};
use agentdex_api::ratings::{aggregate_ratings, AggregateRating, RatingRecord};
use proptest::prelude::*;

/// Builds a 14-digit CNPJ from 12 base digits by computing both check digits.
fn with_check_digits(base: &[u32]) -> String {
    fn digit(digits: &[u32], weights: &[u32]) -> u32 {
        let r = digits.iter().zip(weights).map(|(d, w)| d * w).sum::<u32>() % 11;
        if r < 2 {
            0
        } else {
            11 - r
        }
    }

    let mut digits = base.to_vec();
    digits.push(digit(&digits, &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]));
    digits.push(digit(&digits, &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]));
    digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect()
}

fn base_digits() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..10, 12).prop_filter("not all identical", |d| {
        d.iter().any(|x| *x != d[0])
    })
}

// ============ CNPJ ============

#[test]
fn known_valid_cnpjs() {
    assert!(validate_company_id("11.222.333/0001-81"));
    assert!(validate_company_id("11222333000181"));
    assert!(validate_company_id("45.723.174/0001-10"));
    assert!(validate_company_id("33.000.167/0001-01"));
}

#[test]
fn every_single_digit_mutation_is_rejected() {
    let valid = "11222333000181";
    for (i, original) in valid.chars().enumerate() {
        for replacement in '0'..='9' {
            if replacement == original {
                continue;
            }
            let mut mutated: Vec<char> = valid.chars().collect();
            mutated[i] = replacement;
            let mutated: String = mutated.into_iter().collect();
            assert!(
                !validate_company_id(&mutated),
                "mutation {} at position {} accepted",
                mutated,
                i
            );
        }
    }
}

#[test]
fn repeated_digits_are_rejected() {
    for d in '0'..='9' {
        let repeated: String = std::iter::repeat(d).take(14).collect();
        assert!(!validate_company_id(&repeated), "{} accepted", repeated);
    }
}

proptest! {
    #[test]
    fn cnpj_validation_never_panics(raw in "\\PC*") {
        let _ = validate_company_id(&raw);
        let _ = format_cnpj(&raw);
    }

    #[test]
    fn wrong_length_is_rejected(digits in "[0-9]{0,30}") {
        prop_assume!(digits.len() != 14);
        prop_assert!(!validate_company_id(&digits));
    }

    #[test]
    fn computed_check_digits_are_accepted(base in base_digits()) {
        let cnpj = with_check_digits(&base);
        prop_assert!(validate_company_id(&cnpj));
        prop_assert!(Cnpj::parse(&cnpj).is_some());
    }

    #[test]
    fn wrong_second_check_digit_is_rejected(base in base_digits(), bump in 1u32..10) {
        let cnpj = with_check_digits(&base);
        let last = cnpj.chars().last().and_then(|c| c.to_digit(10)).unwrap();
        let wrong = format!("{}{}", &cnpj[..13], (last + bump) % 10);
        prop_assert!(!validate_company_id(&wrong));
    }

    #[test]
    fn validation_ignores_formatting(
        digits in "[0-9]{14}",
        separators in prop::collection::vec(prop::sample::select(vec![".", "/", "-", " ", ""]), 14)
    ) {
        let decorated: String = digits
            .chars()
            .zip(separators.iter())
            .map(|(c, sep)| format!("{}{}", c, sep))
            .collect();
        prop_assert_eq!(validate_company_id(&digits), validate_company_id(&decorated));
        prop_assert_eq!(validate_company_id(&digits), validate_company_id(&format_cnpj(&digits)));
    }

    #[test]
    fn mask_keeps_the_digits(digits in "[0-9]{0,14}") {
        prop_assert_eq!(normalize(&format_cnpj(&digits)), digits);
    }
}

// ============ Ratings ============

fn records(values: &[i64]) -> Vec<RatingRecord> {
    values.iter().map(|v| RatingRecord::new(*v as f64)).collect()
}

#[test]
fn aggregate_examples() {
    assert_eq!(aggregate_ratings::<RatingRecord>(&[]), AggregateRating { average: None, count: 0 });
    assert_eq!(
        aggregate_ratings(&records(&[5, 4, 3])),
        AggregateRating { average: Some(4.0), count: 3 }
    );
    assert_eq!(
        aggregate_ratings(&records(&[5, 4])),
        AggregateRating { average: Some(4.5), count: 2 }
    );
}

proptest! {
    #[test]
    fn aggregate_is_permutation_invariant(
        (values, shuffled) in prop::collection::vec(-10i64..20, 0..50)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        prop_assert_eq!(aggregate_ratings(&values), aggregate_ratings(&shuffled));
    }

    #[test]
    fn aggregate_is_idempotent(values in prop::collection::vec(1i64..=5, 0..50)) {
        let recs = records(&values);
        prop_assert_eq!(aggregate_ratings(&recs), aggregate_ratings(&recs));
    }

    #[test]
    fn aggregate_stays_within_half_a_tenth_of_the_mean(values in prop::collection::vec(1i64..=5, 1..200)) {
        let agg = aggregate_ratings(&values);
        let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
        let avg = agg.average.unwrap();

        prop_assert_eq!(agg.count, values.len());
        prop_assert!((avg - mean).abs() <= 0.05 + 1e-9);
        prop_assert!((1.0..=5.0).contains(&avg));
        // exactly one decimal place
        prop_assert!(((avg * 10.0).round() - avg * 10.0).abs() < 1e-9);
    }
}
