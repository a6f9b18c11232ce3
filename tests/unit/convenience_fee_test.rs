// Property-based tests for the convenience surcharge.
//
// The 3% fee applies to gateway-routed payments only and is rounded to
// whole rupees; office payments always carry a zero fee. Exercised
// through the order builder so the property holds for real quotes, not
// just the bare formula.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use campuspay::core::Currency;
use campuspay::modules::assignments::models::{FeeAssignment, StaffActor};
use campuspay::modules::fee_structures::models::{FeeBreakdown, FeeSemester, FeeStructure};
use campuspay::modules::payments::models::{PaymentSource, PaymentType};
use campuspay::modules::payments::services::{
    convenience_fee_rate, PaymentIntent, PaymentOrderBuilder, ReconciliationEngine,
};

fn assignment_with_due(amount: Decimal) -> FeeAssignment {
    let fees = FeeBreakdown {
        tuition_fee: amount,
        ..FeeBreakdown::zero()
    };
    let structure = FeeStructure::new(
        "BSc Computer Science".to_string(),
        "2025-2026".to_string(),
        vec![FeeSemester::new(1, "Semester 1".to_string(), fees).unwrap()],
        Decimal::ZERO,
    )
    .unwrap();
    FeeAssignment::new(
        "stu-001".to_string(),
        &structure,
        StaffActor::new("A. Menon", "a.menon@college.example"),
    )
    .unwrap()
}

fn quote_for(amount: Decimal, source: PaymentSource) -> campuspay::modules::payments::services::OrderQuote {
    let assignment = assignment_with_due(amount);
    let status = ReconciliationEngine::compute_status(&assignment, &[]).unwrap();
    PaymentOrderBuilder::build(
        &assignment,
        &status,
        &PaymentIntent {
            payment_type: PaymentType::SemesterPayment,
            semester: Some(1),
            selected_fee_types: None,
            payment_source: source,
            expected_amount: None,
        },
    )
    .unwrap()
}

proptest! {
    #[test]
    fn test_online_fee_is_three_percent_rounded(rupees in 1u64..10_000_000u64) {
        let amount = Decimal::from(rupees);
        let quote = quote_for(amount, PaymentSource::OnlineGateway);

        let expected = Currency::INR.round(amount * convenience_fee_rate());
        prop_assert_eq!(quote.amount, amount);
        prop_assert_eq!(quote.convenience_fee, expected);
        prop_assert_eq!(quote.total_amount, amount + expected);

        // Whole rupees, non-negative, never more than the base amount
        prop_assert_eq!(quote.convenience_fee.normalize().scale(), 0);
        prop_assert!(quote.convenience_fee >= Decimal::ZERO);
        prop_assert!(quote.convenience_fee <= amount);
    }

    #[test]
    fn test_office_fee_is_always_zero(rupees in 1u64..10_000_000u64) {
        let amount = Decimal::from(rupees);
        let quote = quote_for(amount, PaymentSource::ManualOffice);

        prop_assert_eq!(quote.amount, amount);
        prop_assert_eq!(quote.convenience_fee, Decimal::ZERO);
        prop_assert_eq!(quote.total_amount, amount);
    }
}

#[test]
fn test_known_fee_figures() {
    assert_eq!(
        quote_for(dec!(3000), PaymentSource::OnlineGateway).convenience_fee,
        dec!(90)
    );
    assert_eq!(
        quote_for(dec!(25000), PaymentSource::OnlineGateway).convenience_fee,
        dec!(750)
    );
    // 3333 * 0.03 = 99.99, rounds up to a whole rupee
    assert_eq!(
        quote_for(dec!(3333), PaymentSource::OnlineGateway).convenience_fee,
        dec!(100)
    );
    // 101 * 0.03 = 3.03, rounds down
    assert_eq!(
        quote_for(dec!(101), PaymentSource::OnlineGateway).convenience_fee,
        dec!(3)
    );
}
