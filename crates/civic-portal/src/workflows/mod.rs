pub mod applications;
pub mod registry;
