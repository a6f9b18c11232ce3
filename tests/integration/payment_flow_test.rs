// End-to-end payment lifecycle against in-memory repositories and a mock
// gateway: initiation, callback verification, replay idempotence, office
// payments, refunds, and the per-assignment serialization point.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use campuspay::core::AppError;
use campuspay::modules::assignments::services::AssignmentService;
use campuspay::modules::fee_structures::models::FeeType;
use campuspay::modules::fee_structures::services::FeeStructureService;
use campuspay::modules::payments::models::{
    PaymentLineItem, PaymentMethod, PaymentSource, PaymentStatus, PaymentType,
};
use campuspay::modules::payments::repositories::PaymentRepository;
use campuspay::modules::payments::services::{
    FeeStatus, PaymentIntent, PaymentService, VerificationRequest,
};

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{
    staff, two_semester_structure, InMemoryAssignmentRepository, InMemoryFeeStructureRepository,
    InMemoryPaymentRepository, MockGateway,
};

struct TestContext {
    payment_repo: Arc<InMemoryPaymentRepository>,
    gateway: Arc<MockGateway>,
    assignments: AssignmentService,
    payments: PaymentService,
    assignment_id: String,
}

async fn setup() -> TestContext {
    let structure_repo = Arc::new(InMemoryFeeStructureRepository::default());
    let assignment_repo = Arc::new(InMemoryAssignmentRepository::default());
    let payment_repo = Arc::new(InMemoryPaymentRepository::default());
    let gateway = Arc::new(MockGateway::default());

    let structures = FeeStructureService::new(structure_repo.clone(), assignment_repo.clone());
    let assignments = AssignmentService::new(assignment_repo.clone(), structure_repo.clone());
    let payments = PaymentService::new(
        assignment_repo.clone(),
        payment_repo.clone(),
        gateway.clone(),
    );

    let structure = structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let assignment = assignments
        .assign_structure("stu-001", structure.id.as_deref().unwrap(), staff())
        .await
        .unwrap();

    TestContext {
        payment_repo,
        gateway,
        assignments,
        payments,
        assignment_id: assignment.id.unwrap(),
    }
}

fn semester_intent(semester: u32, source: PaymentSource) -> PaymentIntent {
    PaymentIntent {
        payment_type: PaymentType::SemesterPayment,
        semester: Some(semester),
        selected_fee_types: None,
        payment_source: source,
        expected_amount: None,
    }
}

fn verification(
    payment_id: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
) -> VerificationRequest {
    VerificationRequest {
        payment_id: payment_id.to_string(),
        gateway_order_id: gateway_order_id.to_string(),
        gateway_payment_id: gateway_payment_id.to_string(),
        signature: MockGateway::signature_for(gateway_order_id, gateway_payment_id),
    }
}

#[tokio::test]
async fn test_online_semester_payment_lifecycle() {
    let ctx = setup().await;

    let initiation = ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .unwrap();

    assert_eq!(initiation.payment.status, PaymentStatus::Pending);
    assert_eq!(initiation.payment.amount_paid, dec!(25000));
    assert_eq!(initiation.payment.convenience_fee, dec!(750));
    assert_eq!(initiation.payment.total_amount_charged, dec!(25750));
    assert_eq!(initiation.gateway_order.amount, dec!(25750));

    // Pending orders do not change balances
    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(status.semester(1).unwrap().semester_status, FeeStatus::Unpaid);

    let payment_id = initiation.payment.id.clone().unwrap();
    let confirmed = ctx
        .payments
        .confirm_gateway_payment(&verification(
            &payment_id,
            &initiation.gateway_order.gateway_order_id,
            "pay_001",
        ))
        .await
        .unwrap();

    assert_eq!(confirmed.status, PaymentStatus::Completed);
    assert_eq!(confirmed.gateway_payment_id.as_deref(), Some("pay_001"));

    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(
        status.semester(1).unwrap().semester_status,
        FeeStatus::FullyPaid
    );
    // Semester 2 and hostel still owed
    assert_eq!(status.outstanding, dec!(32000));
}

#[tokio::test]
async fn test_duplicate_gateway_callback_is_a_noop() {
    let ctx = setup().await;

    let initiation = ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .unwrap();
    let payment_id = initiation.payment.id.clone().unwrap();
    let request = verification(
        &payment_id,
        &initiation.gateway_order.gateway_order_id,
        "pay_replayed",
    );

    let first = ctx.payments.confirm_gateway_payment(&request).await.unwrap();
    let second = ctx.payments.confirm_gateway_payment(&request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, PaymentStatus::Completed);

    // The ledger gained no new paid amount from the replay
    let ledger = ctx
        .payment_repo
        .list_by_assignment(&ctx.assignment_id)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(status.total_paid, dec!(25000));
}

#[tokio::test]
async fn test_invalid_signature_marks_payment_failed() {
    let ctx = setup().await;

    let initiation = ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .unwrap();
    let payment_id = initiation.payment.id.clone().unwrap();

    let mut request = verification(
        &payment_id,
        &initiation.gateway_order.gateway_order_id,
        "pay_002",
    );
    request.signature = "forged".to_string();

    let err = ctx.payments.confirm_gateway_payment(&request).await.unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let failed = ctx.payment_repo.find_by_id(&payment_id).await.unwrap().unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    // The genuine callback cannot resurrect the failed payment
    let request = verification(
        &payment_id,
        &initiation.gateway_order.gateway_order_id,
        "pay_002",
    );
    assert!(ctx.payments.confirm_gateway_payment(&request).await.is_err());

    // Balances are untouched; the student simply starts a new payment
    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(status.outstanding, dec!(57000));
    assert!(ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_gateway_outage_persists_nothing() {
    let ctx = setup().await;
    ctx.gateway.fail_next_orders(true);

    let err = ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let ledger = ctx
        .payment_repo
        .list_by_assignment(&ctx.assignment_id)
        .await
        .unwrap();
    assert!(ledger.is_empty());

    ctx.gateway.fail_next_orders(false);
    assert!(ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_office_payment_completes_immediately() {
    let ctx = setup().await;

    let payment = ctx
        .payments
        .record_office_payment(
            &ctx.assignment_id,
            &semester_intent(2, PaymentSource::ManualOffice),
            PaymentMethod::CashOffice,
            staff(),
        )
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.convenience_fee, Decimal::ZERO);
    assert_eq!(payment.total_amount_charged, dec!(20000));
    assert_eq!(payment.recorded_by.as_ref().unwrap().email, staff().email);

    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(
        status.semester(2).unwrap().semester_status,
        FeeStatus::FullyPaid
    );
}

#[tokio::test]
async fn test_partial_payment_rejects_already_paid_type() {
    let ctx = setup().await;

    let partial = |fee_types: Vec<FeeType>| PaymentIntent {
        payment_type: PaymentType::PartialPayment,
        semester: Some(1),
        selected_fee_types: Some(fee_types),
        payment_source: PaymentSource::ManualOffice,
        expected_amount: None,
    };

    ctx.payments
        .record_office_payment(
            &ctx.assignment_id,
            &partial(vec![FeeType::TuitionFee]),
            PaymentMethod::CashOffice,
            staff(),
        )
        .await
        .unwrap();

    // Same fee type again is a hard failure, not a skip
    let err = ctx
        .payments
        .record_office_payment(
            &ctx.assignment_id,
            &partial(vec![FeeType::TuitionFee]),
            PaymentMethod::CashOffice,
            staff(),
        )
        .await
        .unwrap_err();
    match err {
        AppError::Validation(msg) => assert!(msg.contains("already been paid"), "{}", msg),
        other => panic!("expected validation error, got {:?}", other),
    }

    // The untouched admission fee still goes through
    assert!(ctx
        .payments
        .record_office_payment(
            &ctx.assignment_id,
            &partial(vec![FeeType::AdmissionFee]),
            PaymentMethod::CashOffice,
            staff(),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn test_concurrent_payments_serialize_per_assignment() {
    let ctx = setup().await;

    // Two counter clerks record the same semester at once; the advisory
    // lock makes one of them see an exhausted balance
    let first_intent = semester_intent(1, PaymentSource::ManualOffice);
    let first = ctx.payments.record_office_payment(
        &ctx.assignment_id,
        &first_intent,
        PaymentMethod::CashOffice,
        staff(),
    );
    let second_intent = semester_intent(1, PaymentSource::ManualOffice);
    let second = ctx.payments.record_office_payment(
        &ctx.assignment_id,
        &second_intent,
        PaymentMethod::Dd,
        staff(),
    );

    let (first, second) = tokio::join!(first, second);
    assert_eq!(
        first.is_ok() as u8 + second.is_ok() as u8,
        1,
        "exactly one concurrent payment must succeed"
    );

    let ledger = ctx
        .payment_repo
        .list_by_assignment(&ctx.assignment_id)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(status.semester(1).unwrap().total_paid, dec!(25000));
}

#[tokio::test]
async fn test_stale_approved_amount_conflicts() {
    let ctx = setup().await;

    // The student sees 25750 on screen...
    let quoted = ctx
        .payments
        .quote(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .unwrap();
    assert_eq!(quoted.total_amount, dec!(25750));

    // ...then the office records part of the semester in the meantime
    ctx.payments
        .record_office_payment(
            &ctx.assignment_id,
            &PaymentIntent {
                payment_type: PaymentType::PartialPayment,
                semester: Some(1),
                selected_fee_types: Some(vec![FeeType::AdmissionFee]),
                payment_source: PaymentSource::ManualOffice,
                expected_amount: None,
            },
            PaymentMethod::CashOffice,
            staff(),
        )
        .await
        .unwrap();

    let mut stale = semester_intent(1, PaymentSource::OnlineGateway);
    stale.expected_amount = Some(quoted.total_amount);
    let err = ctx
        .payments
        .initiate_payment(&ctx.assignment_id, &stale)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_refunds_move_balances_backward() {
    let ctx = setup().await;

    let payment = ctx
        .payments
        .record_office_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::ManualOffice),
            PaymentMethod::BankTransfer,
            staff(),
        )
        .await
        .unwrap();
    let payment_id = payment.id.clone().unwrap();

    let refunded = ctx
        .payments
        .refund_payment(&payment_id, Some("admission withdrawn".to_string()), staff())
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(status.semester(1).unwrap().semester_status, FeeStatus::Unpaid);
    assert_eq!(status.semester(1).unwrap().outstanding, dec!(25000));
}

#[tokio::test]
async fn test_partial_refund_leaves_remainder_paid() {
    let ctx = setup().await;

    let payment = ctx
        .payments
        .record_office_payment(
            &ctx.assignment_id,
            &semester_intent(2, PaymentSource::ManualOffice),
            PaymentMethod::Cheque,
            staff(),
        )
        .await
        .unwrap();
    let payment_id = payment.id.clone().unwrap();

    let refunded = ctx
        .payments
        .partial_refund(
            &payment_id,
            dec!(5000),
            vec![PaymentLineItem {
                semester: 2,
                fee_type: FeeType::TuitionFee,
                amount: dec!(5000),
            }],
            None,
            staff(),
        )
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::PartialRefund);

    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    let sem2 = status.semester(2).unwrap();
    assert_eq!(sem2.semester_status, FeeStatus::PartiallyPaid);
    assert_eq!(sem2.total_paid, dec!(15000));
    assert_eq!(sem2.outstanding, dec!(5000));
}

#[tokio::test]
async fn test_hostel_payment_lifecycle() {
    let ctx = setup().await;

    let hostel = PaymentIntent {
        payment_type: PaymentType::HostelFee,
        semester: None,
        selected_fee_types: None,
        payment_source: PaymentSource::OnlineGateway,
        expected_amount: None,
    };

    let initiation = ctx
        .payments
        .initiate_payment(&ctx.assignment_id, &hostel)
        .await
        .unwrap();
    assert_eq!(initiation.payment.total_amount_charged, dec!(12360));

    let payment_id = initiation.payment.id.clone().unwrap();
    ctx.payments
        .confirm_gateway_payment(&verification(
            &payment_id,
            &initiation.gateway_order.gateway_order_id,
            "pay_hostel",
        ))
        .await
        .unwrap();

    let status = ctx.payments.payment_status(&ctx.assignment_id).await.unwrap();
    assert_eq!(status.hostel.status, FeeStatus::FullyPaid);

    // A second hostel order has nothing left to charge
    assert!(ctx
        .payments
        .initiate_payment(&ctx.assignment_id, &hostel)
        .await
        .is_err());
}

#[tokio::test]
async fn test_deactivated_assignment_rejects_payments() {
    let ctx = setup().await;

    ctx.assignments.deactivate(&ctx.assignment_id).await.unwrap();

    let err = ctx
        .payments
        .initiate_payment(
            &ctx.assignment_id,
            &semester_intent(1, PaymentSource::OnlineGateway),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
