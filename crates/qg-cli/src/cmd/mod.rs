pub mod serve;
pub mod validate_config;
pub mod validate_query;
