//! Result and model storage formats

pub mod formats;
pub mod hmmfile;
pub mod records;

pub use formats::{
    parse_results, DomainTableParser, DomainTableWriter, HitParser, Hmmer3TextParser, ResultFormat,
};
pub use hmmfile::{HmmFile, HmmProfile};
pub use records::{Domain, Hit, QueryResult};
