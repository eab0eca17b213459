pub mod logger;
pub mod screening_pipeline;
