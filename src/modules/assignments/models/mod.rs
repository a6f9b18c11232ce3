pub mod fee_assignment;

pub use fee_assignment::{FeeAssignment, FeeCustomization, FeeStructureSnapshot, StaffActor};
