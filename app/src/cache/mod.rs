pub mod dataset;
pub mod normalize;
pub mod quota;
pub mod refresh;
pub mod store;
pub mod validity;
