pub mod metrics;
pub mod records;
pub mod subjects;
