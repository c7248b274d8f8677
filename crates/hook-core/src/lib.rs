pub mod model;
pub mod signatures;
