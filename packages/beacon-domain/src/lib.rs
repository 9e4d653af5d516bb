pub mod geo;
pub mod rank;
