/// Unit tests for the qualification decision engine: the canonical
/// ratio-and-payback table, the band-only AI path, and their documented
/// divergence.
use solar_loan_api::engine::{
    decide, decide_by_band, payment_ratio, sun_hours_for_state, CreditBand, QualificationStatus,
};

#[cfg(test)]
mod decision_table_tests {
    use super::*;

    #[test]
    fn test_excellent_band() {
        assert_eq!(
            decide(CreditBand::Excellent, 1.0, 5.0),
            QualificationStatus::Approved
        );
        assert_eq!(
            decide(CreditBand::Excellent, 1.4, 12.0),
            QualificationStatus::Borderline
        );
        assert_eq!(
            decide(CreditBand::Excellent, 2.0, 20.0),
            QualificationStatus::NotQualified
        );
    }

    #[test]
    fn test_excellent_boundaries_inclusive() {
        // The thresholds themselves qualify
        assert_eq!(
            decide(CreditBand::Excellent, 1.2, 10.0),
            QualificationStatus::Approved
        );
        assert_eq!(
            decide(CreditBand::Excellent, 1.5, 15.0),
            QualificationStatus::Borderline
        );
    }

    #[test]
    fn test_good_band() {
        assert_eq!(
            decide(CreditBand::Good, 1.0, 8.0),
            QualificationStatus::Approved
        );
        assert_eq!(
            decide(CreditBand::Good, 1.3, 12.0),
            QualificationStatus::Borderline
        );
        // Ratio fine but payback too long
        assert_eq!(
            decide(CreditBand::Good, 0.5, 13.0),
            QualificationStatus::NotQualified
        );
    }

    #[test]
    fn test_fair_band() {
        assert_eq!(
            decide(CreditBand::Fair, 0.9, 7.0),
            QualificationStatus::Approved
        );
        assert_eq!(
            decide(CreditBand::Fair, 1.0, 9.0),
            QualificationStatus::Borderline
        );
        assert_eq!(
            decide(CreditBand::Fair, 1.2, 9.0),
            QualificationStatus::NotQualified
        );
    }

    #[test]
    fn test_poor_is_never_approved() {
        for ratio in [0.1, 0.5, 0.8, 1.0, 2.0] {
            for payback in [0.0, 1.0, 5.0, 10.0, 20.0] {
                let status = decide(CreditBand::Poor, ratio, payback);
                assert_ne!(
                    status,
                    QualificationStatus::Approved,
                    "Poor credit approved at ratio {} payback {}",
                    ratio,
                    payback
                );
            }
        }

        assert_eq!(
            decide(CreditBand::Poor, 0.8, 5.0),
            QualificationStatus::Borderline
        );
        assert_eq!(
            decide(CreditBand::Poor, 0.81, 5.0),
            QualificationStatus::NotQualified
        );
        assert_eq!(
            decide(CreditBand::Poor, 0.5, 6.0),
            QualificationStatus::NotQualified
        );
    }

    #[test]
    fn test_zero_bill_ratio_is_infinite() {
        let ratio = payment_ratio(120.0, 0.0);
        assert!(ratio.is_infinite());

        // Infinity fails every band without a fault
        for band in CreditBand::ALL {
            assert_eq!(decide(band, ratio, 5.0), QualificationStatus::NotQualified);
        }
    }

    #[test]
    fn test_decision_is_idempotent() {
        for band in CreditBand::ALL {
            for ratio in [0.3, 0.9, 1.25, 3.0] {
                for payback in [0.0, 6.5, 14.0] {
                    assert_eq!(
                        decide(band, ratio, payback),
                        decide(band, ratio, payback),
                        "verdict changed between identical calls"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod band_only_path_tests {
    use super::*;

    #[test]
    fn test_band_only_mapping() {
        assert_eq!(
            decide_by_band(CreditBand::Excellent),
            QualificationStatus::Approved
        );
        assert_eq!(decide_by_band(CreditBand::Good), QualificationStatus::Approved);
        assert_eq!(
            decide_by_band(CreditBand::Fair),
            QualificationStatus::Borderline
        );
        assert_eq!(
            decide_by_band(CreditBand::Poor),
            QualificationStatus::NotQualified
        );
    }

    #[test]
    fn test_paths_diverge_and_stay_separate() {
        // Good credit with terrible economics: table rejects, band-only approves
        assert_eq!(
            decide(CreditBand::Good, 2.5, 25.0),
            QualificationStatus::NotQualified
        );
        assert_eq!(decide_by_band(CreditBand::Good), QualificationStatus::Approved);

        // Poor credit with great economics: table says borderline, band-only rejects
        assert_eq!(
            decide(CreditBand::Poor, 0.5, 3.0),
            QualificationStatus::Borderline
        );
        assert_eq!(
            decide_by_band(CreditBand::Poor),
            QualificationStatus::NotQualified
        );
    }
}

#[cfg(test)]
mod loan_terms_tests {
    use super::*;

    #[test]
    fn test_fixed_terms_table() {
        let excellent = CreditBand::Excellent.loan_terms();
        assert_eq!(excellent.apr, 3.99);
        assert_eq!(excellent.term, 25);
        assert_eq!(excellent.down_payment, 0.0);

        let poor = CreditBand::Poor.loan_terms();
        assert_eq!(poor.apr, 12.99);
        assert_eq!(poor.term, 10);
        assert_eq!(poor.down_payment, 20.0);
    }

    #[test]
    fn test_worse_credit_worse_terms() {
        let aprs: Vec<f64> = CreditBand::ALL.iter().map(|b| b.loan_terms().apr).collect();
        assert!(aprs.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_credit_band_parsing() {
    assert_eq!(CreditBand::parse("Excellent"), Some(CreditBand::Excellent));
    assert_eq!(CreditBand::parse("Poor"), Some(CreditBand::Poor));
    assert_eq!(CreditBand::parse("excellent"), None);
    assert_eq!(CreditBand::parse("AAA"), None);
    assert_eq!(CreditBand::parse(""), None);
}

#[test]
fn test_status_wire_format() {
    assert_eq!(
        serde_json::to_string(&QualificationStatus::Approved).unwrap(),
        "\"approved\""
    );
    assert_eq!(
        serde_json::to_string(&QualificationStatus::NotQualified).unwrap(),
        "\"not_qualified\""
    );
    assert_eq!(QualificationStatus::Borderline.as_str(), "borderline");
}

#[test]
fn test_sun_hours_table() {
    assert_eq!(sun_hours_for_state("CA"), 5.8);
    assert_eq!(sun_hours_for_state("IL"), 4.0);
    assert_eq!(sun_hours_for_state("US"), 4.5);
    assert_eq!(sun_hours_for_state("MT"), 4.5);
}
