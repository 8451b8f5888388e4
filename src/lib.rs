pub mod calibration;
pub mod export;
pub mod heatmap;
pub mod http_cache;
pub mod http_client;
pub mod rankings;
pub mod schema;
pub mod scoring;
pub mod settings;
pub mod state;
pub mod table_fetch;
pub mod telemetry;

pub use rankings::{rank, RankFilters, RankScope, RankedRow, RankedTable};
pub use schema::{normalize, RawTable};
pub use scoring::{score, ScoringConfig};
