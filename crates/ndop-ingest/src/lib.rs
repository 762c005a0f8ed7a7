pub mod error;
pub mod mapping_file;
pub mod source;
pub mod sqlite;

pub use error::{Dataset, Result, SourceError};
pub use mapping_file::{
    MappingTable, load_lsoa_overrides, load_practice_overrides, lsoa_overrides,
    practice_overrides, read_mapping_table,
};
pub use source::{MemorySource, OptOutSource, ReferenceSnapshot, ReferenceSource};
pub use sqlite::{SCHEMA, SqliteSource};
