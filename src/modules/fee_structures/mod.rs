// Fee structure catalog module

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{FeeBreakdown, FeeOverride, FeeSemester, FeeStructure, FeeType};
pub use repositories::{FeeStructureRepository, MySqlFeeStructureRepository};
pub use services::FeeStructureService;
