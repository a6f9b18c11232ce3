pub mod fee_structure_service;

pub use fee_structure_service::FeeStructureService;
