// Fee assignment module

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{FeeAssignment, FeeCustomization, FeeStructureSnapshot, StaffActor};
pub use repositories::{AssignmentRepository, MySqlAssignmentRepository};
pub use services::AssignmentService;
