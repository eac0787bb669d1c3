pub mod apply;
pub mod instances;
pub mod plan;
