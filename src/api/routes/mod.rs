pub mod meet;
pub mod stats;
