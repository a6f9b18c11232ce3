pub mod fee_structure;

pub use fee_structure::{FeeBreakdown, FeeOverride, FeeSemester, FeeStructure, FeeType};
