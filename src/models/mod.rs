pub mod context;
pub mod dataset;
pub mod instruction;
