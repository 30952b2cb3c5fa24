pub mod aggregate;
pub mod census;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rates;
pub mod record;
pub mod reduce;
pub mod report;
pub mod split;
