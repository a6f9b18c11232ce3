pub mod fee_structure_repository;

pub use fee_structure_repository::{FeeStructureRepository, MySqlFeeStructureRepository};
