//! Semantic log compression and query engine.
//!
//! Pipeline: [`token`] segments a raw line, [`semantic`] labels its fields,
//! [`template`] groups structurally similar lines into [`template::LogTemplate`]s,
//! [`columns`] and [`codec`] turn matched fields into per-category columns,
//! [`encoder`] drives that pipeline end to end into a [`container::CompressedLog`],
//! and [`container`] serializes/deserializes it to a self-describing binary
//! file. [`query`] answers selective questions against a loaded container
//! without fully reconstructing the original corpus.

pub mod codec;
pub mod columns;
pub mod config;
pub mod container;
pub mod encoder;
pub mod error;
pub mod query;
pub mod record;
pub mod semantic;
pub mod template;
pub mod token;

pub use config::CompressionConfig;
pub use container::CompressedLog;
pub use encoder::Encoder;
pub use error::{CodecError, ContainerError, QueryError};
pub use query::{Combinator, Predicate, QueryHandle, QueryResult, Session, Stats};
pub use semantic::{ColumnCategory, SemanticType};
pub use template::LogTemplate;
