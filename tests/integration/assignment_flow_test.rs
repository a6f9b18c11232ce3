// Catalog and assignment flows: structure immutability once referenced,
// snapshot insulation, the customization event log, and single-active-
// assignment enforcement.

use std::sync::Arc;

use rust_decimal_macros::dec;

use campuspay::core::AppError;
use campuspay::modules::assignments::models::FeeCustomization;
use campuspay::modules::assignments::services::AssignmentService;
use campuspay::modules::fee_structures::models::{FeeOverride, FeeType};
use campuspay::modules::fee_structures::services::FeeStructureService;
use campuspay::modules::payments::services::PaymentService;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{
    staff, two_semester_structure, InMemoryAssignmentRepository, InMemoryFeeStructureRepository,
    InMemoryPaymentRepository, MockGateway,
};

struct TestContext {
    structures: FeeStructureService,
    assignments: AssignmentService,
    payments: PaymentService,
}

fn setup() -> TestContext {
    let structure_repo = Arc::new(InMemoryFeeStructureRepository::default());
    let assignment_repo = Arc::new(InMemoryAssignmentRepository::default());
    let payment_repo = Arc::new(InMemoryPaymentRepository::default());
    let gateway = Arc::new(MockGateway::default());

    TestContext {
        structures: FeeStructureService::new(structure_repo.clone(), assignment_repo.clone()),
        assignments: AssignmentService::new(assignment_repo.clone(), structure_repo.clone()),
        payments: PaymentService::new(assignment_repo, payment_repo, gateway),
    }
}

fn admission_override(amount: rust_decimal::Decimal) -> FeeOverride {
    let mut fees = FeeOverride::default();
    fees.set_amount(FeeType::AdmissionFee, amount);
    fees
}

#[tokio::test]
async fn test_duplicate_structure_for_program_year_rejected() {
    let ctx = setup();

    ctx.structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let err = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_structure_becomes_immutable_once_assigned() {
    let ctx = setup();

    let mut structure = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let structure_id = structure.id.clone().unwrap();

    // Editable while nothing references it
    structure.hostel_fee = dec!(15000);
    let structure = ctx.structures.update_structure(structure).await.unwrap();

    ctx.assignments
        .assign_structure("stu-001", &structure_id, staff())
        .await
        .unwrap();

    let mut edited = structure.clone();
    edited.hostel_fee = dec!(18000);
    let err = ctx.structures.update_structure(edited).await.unwrap_err();
    match err {
        AppError::Validation(msg) => assert!(msg.contains("no longer be edited"), "{}", msg),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_snapshot_survives_catalog_edit() {
    let ctx = setup();

    let mut structure = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let structure_id = structure.id.clone().unwrap();

    let assignment = ctx
        .assignments
        .assign_structure("stu-001", &structure_id, staff())
        .await
        .unwrap();

    // Bypass the service guard to simulate a raw catalog edit; the
    // assignment's snapshot must be unaffected either way
    structure.hostel_fee = dec!(99999);

    let reloaded = ctx
        .assignments
        .get_assignment(assignment.id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(reloaded.snapshot.hostel_fee, dec!(12000));
}

#[tokio::test]
async fn test_one_active_assignment_per_student() {
    let ctx = setup();

    let structure = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let structure_id = structure.id.unwrap();

    let first = ctx
        .assignments
        .assign_structure("stu-001", &structure_id, staff())
        .await
        .unwrap();

    let err = ctx
        .assignments
        .assign_structure("stu-001", &structure_id, staff())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Deactivating frees the student for reassignment
    ctx.assignments
        .deactivate(first.id.as_deref().unwrap())
        .await
        .unwrap();
    assert!(ctx
        .assignments
        .assign_structure("stu-001", &structure_id, staff())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_customization_changes_reconciled_balance() {
    let ctx = setup();

    let structure = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let assignment = ctx
        .assignments
        .assign_structure("stu-001", structure.id.as_deref().unwrap(), staff())
        .await
        .unwrap();
    let assignment_id = assignment.id.unwrap();

    let before = ctx.payments.payment_status(&assignment_id).await.unwrap();
    assert_eq!(before.semester(1).unwrap().outstanding, dec!(25000));

    ctx.assignments
        .add_customization(
            &assignment_id,
            FeeCustomization::new(
                1,
                admission_override(dec!(3000)),
                Some("merit scholarship".to_string()),
                staff(),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let after = ctx.payments.payment_status(&assignment_id).await.unwrap();
    assert_eq!(after.semester(1).unwrap().outstanding, dec!(23000));

    // The event log keeps both the override and its provenance
    let reloaded = ctx.assignments.get_assignment(&assignment_id).await.unwrap();
    assert_eq!(reloaded.customizations.len(), 1);
    assert_eq!(
        reloaded.customizations[0].reason.as_deref(),
        Some("merit scholarship")
    );
}

#[tokio::test]
async fn test_customization_rejects_unknown_semester() {
    let ctx = setup();

    let structure = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let assignment = ctx
        .assignments
        .assign_structure("stu-001", structure.id.as_deref().unwrap(), staff())
        .await
        .unwrap();

    let err = ctx
        .assignments
        .add_customization(
            assignment.id.as_deref().unwrap(),
            FeeCustomization::new(9, admission_override(dec!(3000)), None, staff()).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_customization_rejected_on_inactive_assignment() {
    let ctx = setup();

    let structure = ctx
        .structures
        .create_structure(two_semester_structure())
        .await
        .unwrap();
    let assignment = ctx
        .assignments
        .assign_structure("stu-001", structure.id.as_deref().unwrap(), staff())
        .await
        .unwrap();
    let assignment_id = assignment.id.unwrap();

    ctx.assignments.deactivate(&assignment_id).await.unwrap();

    let err = ctx
        .assignments
        .add_customization(
            &assignment_id,
            FeeCustomization::new(1, admission_override(dec!(3000)), None, staff()).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
