pub mod change_point_service;
pub mod csv_import_service;
pub mod impact_service;
pub mod indicators;
pub mod mcmc;
pub mod query_service;
pub mod sample_data;
pub mod statistics_service;
pub mod summary_cache;
