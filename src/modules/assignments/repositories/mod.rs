pub mod assignment_repository;

pub use assignment_repository::{AssignmentRepository, MySqlAssignmentRepository};
