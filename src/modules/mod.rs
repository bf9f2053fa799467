pub mod documents;
pub mod quiz;
pub mod training;
