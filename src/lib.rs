//! airlog - Cleaning, correlation and spectral analysis for air-quality sensor logs
//!
//! This library turns raw hourly readings (CO, NO2, temperature, humidity)
//! into a gap-free table, derives filtered series from it, and extracts
//! pairwise correlations and periodic components. Results are persisted
//! through the [`store::AnalysisStore`] trait.
//!
//! ## Module Structure
//!
//! - [`table`] - Channels, raw measurements and the cleaned column table
//! - [`analysis`] - Cleaning, filters, correlation and spectral algorithms
//! - [`session`] - Loaded data and the engines configured for one run
//! - [`store`] - Persistence trait and the SQLite backend
//! - [`settings`] - Engine settings persistence
//! - [`error`] - Error types shared by every stage

pub mod analysis;
pub mod error;
pub mod session;
pub mod settings;
pub mod store;
pub mod table;

pub use error::AnalysisError;
pub use session::AnalysisSession;
pub use table::{Channel, CleanedTable, Measurement, MeasurementTable};
