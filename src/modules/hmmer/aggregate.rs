//! Turning raw tool output into [`QueryResult`]s
//!
//! The aggregator is a registry of parsers keyed by [`ResultFormat`]. It
//! hands the text to the right one and returns whatever that parser
//! produced, untouched.

use std::collections::HashMap;

use crate::engines::storage::{HitParser, QueryResult, ResultFormat};
use crate::modules::hmmer::{HmmerError, HmmerResult};

/// Parses raw output by named format
pub struct ResultAggregator {
    parsers: HashMap<ResultFormat, Box<dyn HitParser>>,
}

impl ResultAggregator {
    /// An aggregator with the built-in parsers registered
    pub fn new() -> Self {
        let mut aggregator = Self {
            parsers: HashMap::new(),
        };
        for format in [
            ResultFormat::Hmmer3Text,
            ResultFormat::HmmscanDomtab,
            ResultFormat::HmmsearchDomtab,
        ] {
            aggregator.parsers.insert(format, format.parser());
        }
        aggregator
    }

    /// Replace the parser for the format `parser` reports
    pub fn with_parser(mut self, parser: Box<dyn HitParser>) -> Self {
        self.parsers.insert(parser.format(), parser);
        self
    }

    /// Parse `raw_text` as `format`
    pub fn parse(&self, raw_text: &str, format: ResultFormat) -> HmmerResult<Vec<QueryResult>> {
        let parser = self.parsers.get(&format).ok_or_else(|| HmmerError::Parse {
            what: format.name().to_string(),
            detail: "no parser registered".to_string(),
        })?;

        let results = parser
            .parse_str(raw_text)
            .map_err(|e| HmmerError::from_engine(format.name(), e))?;

        log::debug!("parsed {} queries from {} output", results.len(), format);
        Ok(results)
    }

    /// Parse `raw_text` with the format called `format_name`
    pub fn parse_named(&self, raw_text: &str, format_name: &str) -> HmmerResult<Vec<QueryResult>> {
        let format = format_name
            .parse::<ResultFormat>()
            .map_err(|e| HmmerError::from_engine(format_name, e))?;
        self.parse(raw_text, format)
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}
