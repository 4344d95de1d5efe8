pub mod base_model;
pub mod hst;

pub use base_model::BaseModel;
pub use hst::HalfSpaceTrees;
