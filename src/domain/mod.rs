pub mod model;
pub mod payload;
pub mod policy;
