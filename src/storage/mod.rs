pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use models::{
    CompanyFeatureRow, NumberingPatternRow, NumberingSequenceRow, TenantConfigRow, TerminologyRow,
};
pub use postgres::PgStore;
pub use traits::{ConfigRepository, FeatureRepository, NumberingRepository, TerminologyRepository};
