//! Parsers and writers for HMMER result formats
//!
//! Two grammars are understood: the plain-text report HMMER prints on
//! stdout (`hmmer3-text`) and the per-domain table written by
//! `--domtblout` (`hmmscan3-domtab` / `hmmsearch3-domtab`). Parsers keep
//! records in source order and never filter, sort, or merge them.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;

use crate::engines::core::io::read_text_file;
use crate::engines::storage::records::{optional_field, Domain, Hit, QueryResult};
use crate::engines::{EngineError, EngineResult};

/// Named result grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFormat {
    /// Plain-text hit report
    Hmmer3Text,
    /// hmmscan `--domtblout` table
    HmmscanDomtab,
    /// hmmsearch `--domtblout` table
    HmmsearchDomtab,
}

impl ResultFormat {
    /// The format identifier
    pub fn name(&self) -> &'static str {
        match self {
            ResultFormat::Hmmer3Text => "hmmer3-text",
            ResultFormat::HmmscanDomtab => "hmmscan3-domtab",
            ResultFormat::HmmsearchDomtab => "hmmsearch3-domtab",
        }
    }

    /// A parser for this format
    pub fn parser(&self) -> Box<dyn HitParser> {
        match self {
            ResultFormat::Hmmer3Text => Box::new(Hmmer3TextParser::new()),
            ResultFormat::HmmscanDomtab | ResultFormat::HmmsearchDomtab => {
                Box::new(DomainTableParser::new(*self))
            }
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResultFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hmmer3-text" => Ok(ResultFormat::Hmmer3Text),
            "hmmscan3-domtab" => Ok(ResultFormat::HmmscanDomtab),
            "hmmsearch3-domtab" => Ok(ResultFormat::HmmsearchDomtab),
            other => Err(EngineError::UnknownFormat(other.to_string())),
        }
    }
}

/// Trait for result parsers
pub trait HitParser: Send + Sync {
    /// Parse results from text
    fn parse_str(&self, text: &str) -> EngineResult<Vec<QueryResult>>;

    /// Parse results from a file
    fn parse_file(&self, path: &Path) -> EngineResult<Vec<QueryResult>> {
        let text = read_text_file(path)?;
        self.parse_str(&text)
    }

    /// The format this parser reads
    fn format(&self) -> ResultFormat;
}

/// Parse `text` with the parser registered for `format`
pub fn parse_results(text: &str, format: ResultFormat) -> EngineResult<Vec<QueryResult>> {
    format.parser().parse_str(text)
}

/// Split off the first `n` whitespace-separated columns of `line` and
/// return them with the trimmed remainder.
fn split_columns(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut columns = Vec::with_capacity(n);
    let mut rest = line.trim_start();

    while columns.len() < n {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        columns.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }

    Some((columns, rest.trim_end()))
}

fn number<T: FromStr>(token: &str, column: &str, line: usize) -> EngineResult<T> {
    token
        .parse()
        .map_err(|_| EngineError::parse(line, format!("bad {} value {:?}", column, token)))
}

fn optional_number(token: &str, column: &str, line: usize) -> EngineResult<Option<u64>> {
    if token == "-" {
        Ok(None)
    } else {
        number(token, column, line).map(Some)
    }
}

/// Where the text parser is within a query block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    HitTableHeader,
    HitTable,
    Domains,
    DomainTable(usize),
    Alignments,
    Summary,
}

/// Parser for the `hmmer3-text` report
#[derive(Debug, Clone, Default)]
pub struct Hmmer3TextParser;

impl Hmmer3TextParser {
    pub fn new() -> Self {
        Self
    }

    /// `Query:       name  [L=120]`
    fn parse_query_line(rest: &str, line: usize) -> EngineResult<QueryResult> {
        let mut tokens = rest.split_whitespace();
        let id = tokens
            .next()
            .ok_or_else(|| EngineError::parse(line, "query line without a name"))?;

        let mut result = QueryResult::new(id);
        if let Some(size) = tokens.next() {
            let length = size
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split_once('=')
                .map(|(_, value)| value);
            if let Some(value) = length {
                result.length = Some(number(value, "query length", line)?);
            }
        }
        Ok(result)
    }

    /// One row of the per-target score table
    fn parse_hit_row(text: &str, line: usize) -> EngineResult<Hit> {
        // Some HMMER builds prefix rows with a single-character marker
        let text = match text.split_whitespace().next() {
            Some(first) if first.parse::<f64>().is_err() && first.len() == 1 => {
                text.trim_start()[1..].trim_start()
            }
            _ => text,
        };

        let (columns, description) = split_columns(text, 9)
            .ok_or_else(|| EngineError::parse(line, "hit row has too few columns"))?;

        let mut hit = Hit::new(
            columns[8],
            number(columns[0], "E-value", line)?,
            number(columns[1], "score", line)?,
            number(columns[2], "bias", line)?,
        );
        hit.domain_count = number(columns[7], "domain count", line)?;
        hit.description = optional_field(description);
        Ok(hit)
    }

    /// One row of a per-target domain table
    fn parse_domain_row(columns: &[&str], line: usize) -> EngineResult<Domain> {
        if columns.len() < 16 {
            return Err(EngineError::parse(line, "domain row has too few columns"));
        }

        Ok(Domain {
            index: number(columns[0], "domain index", line)?,
            bitscore: number(columns[2], "domain score", line)?,
            bias: number(columns[3], "domain bias", line)?,
            c_evalue: number(columns[4], "c-Evalue", line)?,
            i_evalue: number(columns[5], "i-Evalue", line)?,
            hmm_from: number(columns[6], "hmm from", line)?,
            hmm_to: number(columns[7], "hmm to", line)?,
            ali_from: number(columns[9], "ali from", line)?,
            ali_to: number(columns[10], "ali to", line)?,
            env_from: number(columns[12], "env from", line)?,
            env_to: number(columns[13], "env to", line)?,
            accuracy: number(columns[15], "acc", line)?,
        })
    }
}

impl HitParser for Hmmer3TextParser {
    fn parse_str(&self, text: &str) -> EngineResult<Vec<QueryResult>> {
        let mut results = Vec::new();
        let mut current: Option<QueryResult> = None;
        let mut section = Section::Header;
        let mut last_line = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            last_line = line_no;
            let line = raw.trim_end();
            let trimmed = line.trim_start();

            if let Some(rest) = line.strip_prefix("Query:") {
                if current.is_some() {
                    return Err(EngineError::parse(line_no, "new query before '//'"));
                }
                current = Some(Self::parse_query_line(rest, line_no)?);
                section = Section::Header;
                continue;
            }

            // Program banner and trailing "[ok]" live outside query blocks
            let Some(query) = current.as_mut() else {
                continue;
            };

            if line == "//" {
                results.extend(current.take());
                continue;
            }

            if let Some(rest) = line.strip_prefix("Accession:") {
                query.accession = optional_field(rest);
                continue;
            }
            if let Some(rest) = line.strip_prefix("Description:") {
                query.description = optional_field(rest);
                continue;
            }
            if trimmed.starts_with("Scores for complete sequence") {
                section = Section::HitTableHeader;
                continue;
            }
            if trimmed.starts_with("Domain annotation for each") {
                section = Section::Domains;
                continue;
            }
            if trimmed.starts_with("Internal pipeline statistics summary") {
                section = Section::Summary;
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix(">>") {
                if !matches!(
                    section,
                    Section::Domains | Section::DomainTable(_) | Section::Alignments
                ) {
                    return Err(EngineError::parse(
                        line_no,
                        "domain section outside domain annotation",
                    ));
                }
                let target = rest
                    .split_whitespace()
                    .next()
                    .ok_or_else(|| EngineError::parse(line_no, "domain section without a target"))?;
                // Targets are unique within one query's report
                let position = query
                    .hits
                    .iter()
                    .position(|hit| hit.id == target)
                    .ok_or_else(|| {
                        EngineError::parse(
                            line_no,
                            format!("domains for unreported target {:?}", target),
                        )
                    })?;
                section = Section::DomainTable(position);
                continue;
            }

            match section {
                Section::HitTableHeader => {
                    if trimmed.starts_with("-------") {
                        section = Section::HitTable;
                    }
                }
                Section::HitTable => {
                    if trimmed.is_empty() {
                        section = Section::Header;
                    } else if !trimmed.starts_with("------ inclusion threshold")
                        && !trimmed.starts_with("[No hits detected")
                    {
                        query.hits.push(Self::parse_hit_row(trimmed, line_no)?);
                    }
                }
                Section::DomainTable(position) => {
                    if trimmed.starts_with("Alignments for each domain") {
                        section = Section::Alignments;
                        continue;
                    }
                    let columns: Vec<&str> = trimmed.split_whitespace().collect();
                    let is_row = columns.len() > 1
                        && columns[0].parse::<usize>().is_ok()
                        && (columns[1] == "!" || columns[1] == "?");
                    if is_row {
                        let domain = Self::parse_domain_row(&columns, line_no)?;
                        query.hits[position].domains.push(domain);
                    }
                }
                Section::Header | Section::Domains | Section::Alignments | Section::Summary => {}
            }
        }

        if current.is_some() {
            return Err(EngineError::parse(last_line, "truncated report: missing '//'"));
        }

        Ok(results)
    }

    fn format(&self) -> ResultFormat {
        ResultFormat::Hmmer3Text
    }
}

/// Number of fixed columns before the free-text description
const DOMTAB_COLUMNS: usize = 22;

/// Parser for `--domtblout` tables
#[derive(Debug, Clone)]
pub struct DomainTableParser {
    format: ResultFormat,
}

impl DomainTableParser {
    /// Create a parser that reports itself as `format`
    pub fn new(format: ResultFormat) -> Self {
        Self { format }
    }
}

impl Default for DomainTableParser {
    fn default() -> Self {
        Self::new(ResultFormat::HmmsearchDomtab)
    }
}

impl HitParser for DomainTableParser {
    fn parse_str(&self, text: &str) -> EngineResult<Vec<QueryResult>> {
        let mut results: Vec<QueryResult> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            // Skip comments and blank lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (c, description) = split_columns(line, DOMTAB_COLUMNS).ok_or_else(|| {
                EngineError::parse(line_no, format!("expected {} columns", DOMTAB_COLUMNS))
            })?;

            let query_accession = optional_field(c[4]);
            let same_query = results
                .last()
                .map_or(false, |q| q.id == c[3] && q.accession == query_accession);
            if !same_query {
                let mut query = QueryResult::new(c[3]);
                query.accession = query_accession;
                query.length = optional_number(c[5], "qlen", line_no)?;
                results.push(query);
            }
            let query = results.last_mut().ok_or_else(|| EngineError::parse(line_no, "no query"))?;

            let same_target = query.hits.last().map_or(false, |hit| hit.id == c[0]);
            if !same_target {
                let mut hit = Hit::new(
                    c[0],
                    number(c[6], "E-value", line_no)?,
                    number(c[7], "score", line_no)?,
                    number(c[8], "bias", line_no)?,
                );
                hit.accession = optional_field(c[1]);
                hit.length = optional_number(c[2], "tlen", line_no)?;
                hit.domain_count = number(c[10], "domain count", line_no)?;
                hit.description = optional_field(description);
                query.hits.push(hit);
            }
            let hit = query.hits.last_mut().ok_or_else(|| EngineError::parse(line_no, "no hit"))?;

            hit.domains.push(Domain {
                index: number(c[9], "domain index", line_no)?,
                c_evalue: number(c[11], "c-Evalue", line_no)?,
                i_evalue: number(c[12], "i-Evalue", line_no)?,
                bitscore: number(c[13], "domain score", line_no)?,
                bias: number(c[14], "domain bias", line_no)?,
                hmm_from: number(c[15], "hmm from", line_no)?,
                hmm_to: number(c[16], "hmm to", line_no)?,
                ali_from: number(c[17], "ali from", line_no)?,
                ali_to: number(c[18], "ali to", line_no)?,
                env_from: number(c[19], "env from", line_no)?,
                env_to: number(c[20], "env to", line_no)?,
                accuracy: number(c[21], "acc", line_no)?,
            });
        }

        Ok(results)
    }

    fn format(&self) -> ResultFormat {
        self.format
    }
}

const DOMTAB_HEADER: [&str; 3] = [
    "#                                                                            --- full sequence --- -------------- this domain -------------   hmm coord   ali coord   env coord",
    "# target name        accession   tlen query name           accession   qlen   E-value  score  bias   #  of  c-Evalue  i-Evalue  score  bias  from    to  from    to  from    to  acc description of target",
    "#------------------- ---------- ----- -------------------- ---------- ----- --------- ------ ----- --- --- --------- --------- ------ ----- ----- ----- ----- ----- ----- ----- ---- ---------------------",
];

/// Writer for `--domtblout`-style tables
#[derive(Debug, Clone, Default)]
pub struct DomainTableWriter;

impl DomainTableWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write the rows of one query, preceded by the column header if
    /// `header` is set. Returns the number of rows written.
    pub fn write_query<W: Write>(
        &self,
        out: &mut W,
        query: &QueryResult,
        header: bool,
    ) -> io::Result<usize> {
        if header {
            writeln!(out, "{}", DOMTAB_HEADER.iter().join("\n"))?;
        }

        let mut rows = 0;
        for hit in &query.hits {
            for domain in &hit.domains {
                writeln!(
                    out,
                    "{:<20} {:<10} {:>5} {:<20} {:<10} {:>5} {:>9.2e} {:>6.1} {:>5.1} {:>3} {:>3} {:>9.2e} {:>9.2e} {:>6.1} {:>5.1} {:>5} {:>5} {:>5} {:>5} {:>5} {:>5} {:>4.2} {}",
                    hit.id,
                    hit.accession.as_deref().unwrap_or("-"),
                    hit.length.map_or_else(|| "-".to_string(), |l| l.to_string()),
                    query.id,
                    query.accession.as_deref().unwrap_or("-"),
                    query.length.map_or_else(|| "-".to_string(), |l| l.to_string()),
                    hit.evalue,
                    hit.bitscore,
                    hit.bias,
                    domain.index,
                    hit.domain_count.max(hit.domains.len()),
                    domain.c_evalue,
                    domain.i_evalue,
                    domain.bitscore,
                    domain.bias,
                    domain.hmm_from,
                    domain.hmm_to,
                    domain.ali_from,
                    domain.ali_to,
                    domain.env_from,
                    domain.env_to,
                    domain.accuracy,
                    hit.description.as_deref().unwrap_or("-"),
                )?;
                rows += 1;
            }
        }

        Ok(rows)
    }

    /// Write several queries: header once, then headerless blocks
    pub fn write_all<W: Write>(&self, out: &mut W, queries: &[QueryResult]) -> io::Result<usize> {
        let mut rows = 0;
        for (i, query) in queries.iter().enumerate() {
            rows += self.write_query(out, query, i == 0)?;
        }
        Ok(rows)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in [
            ResultFormat::Hmmer3Text,
            ResultFormat::HmmscanDomtab,
            ResultFormat::HmmsearchDomtab,
        ] {
            assert_eq!(format.name().parse::<ResultFormat>().unwrap(), format);
            assert_eq!(format.parser().format(), format);
        }
        assert!(matches!(
            "blast-tab".parse::<ResultFormat>(),
            Err(EngineError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_split_columns_keeps_description_spacing() {
        let (columns, rest) = split_columns("  a  b   c  free  text here ", 3).unwrap();
        assert_eq!(columns, vec!["a", "b", "c"]);
        assert_eq!(rest, "free  text here");
        assert!(split_columns("a b", 3).is_none());
    }

    #[test]
    fn test_text_report_with_one_hit() {
        let results = Hmmer3TextParser::new().parse_str(HMMSCAN_ONE_HIT).unwrap();

        assert_eq!(results.len(), 1);
        let query = &results[0];
        assert_eq!(query.id, "seq1");
        assert_eq!(query.length, Some(120));
        assert_eq!(query.hits.len(), 1);

        let hit = &query.hits[0];
        assert_eq!(hit.id, "PF00001");
        assert_eq!(hit.description.as_deref(), Some("7 transmembrane receptor"));
        assert_eq!(hit.evalue, 1.2e-10);
        assert_eq!(hit.bitscore, 40.1);
        assert_eq!(hit.domain_count, 1);

        assert_eq!(hit.domains.len(), 1);
        let domain = &hit.domains[0];
        assert_eq!(domain.index, 1);
        assert_eq!(domain.i_evalue, 1.5e-10);
        assert_eq!((domain.hmm_from, domain.hmm_to), (2, 50));
        assert_eq!((domain.ali_from, domain.ali_to), (10, 58));
        assert_eq!((domain.env_from, domain.env_to), (9, 60));
        assert_eq!(domain.accuracy, 0.95);
    }

    #[test]
    fn test_text_report_without_hits() {
        let results = Hmmer3TextParser::new().parse_str(HMMSCAN_NO_HITS).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "seq2");
        assert!(results[0].is_empty());
    }

    #[test]
    fn test_text_reports_concatenate_in_order() {
        let text = format!("{}{}", HMMSCAN_NO_HITS, HMMSCAN_ONE_HIT);
        let ids: Vec<_> = Hmmer3TextParser::new()
            .parse_str(&text)
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec!["seq2", "seq1"]);
    }

    #[test]
    fn test_truncated_text_report_is_an_error() {
        let truncated = HMMSCAN_ONE_HIT.replace("//\n", "");
        let err = Hmmer3TextParser::new().parse_str(&truncated).unwrap_err();
        assert!(err.to_string().contains("missing '//'"));
    }

    #[test]
    fn test_malformed_hit_row_is_an_error() {
        let broken = HMMSCAN_ONE_HIT.replace("1.2e-10   40.1", "1.2e-10   forty");
        let err = Hmmer3TextParser::new().parse_str(&broken).unwrap_err();
        assert!(matches!(err, EngineError::Parse { line: 13, .. }));
    }

    #[test]
    fn test_empty_text_has_no_results() {
        assert!(Hmmer3TextParser::new().parse_str("").unwrap().is_empty());
        assert!(DomainTableParser::default().parse_str("").unwrap().is_empty());
    }

    #[test]
    fn test_domain_table_groups_consecutive_rows() {
        let results = DomainTableParser::default().parse_str(HMMSEARCH_DOMTAB).unwrap();

        assert_eq!(results.len(), 1);
        let query = &results[0];
        assert_eq!(query.id, "Lant_dehydr_N");
        assert_eq!(query.accession.as_deref(), Some("PF04738.14"));
        assert_eq!(query.length, Some(436));

        assert_eq!(query.hits.len(), 2);
        assert_eq!(query.hits[0].id, "ctg1_12");
        assert_eq!(query.hits[0].length, Some(310));
        assert_eq!(query.hits[0].description.as_deref(), Some("lanthipeptide dehydratase"));
        assert_eq!(query.hits[0].domains.len(), 2);
        assert_eq!(query.hits[0].domains[1].index, 2);
        assert_eq!(query.hits[0].domains[1].ali_from, 240);

        assert_eq!(query.hits[1].id, "ctg1_40");
        assert_eq!(query.hits[1].accession, None);
        assert_eq!(query.hits[1].description, None);
        assert_eq!(query.hits[1].domains[0].accuracy, 0.71);
    }

    #[test]
    fn test_domain_table_short_row_is_an_error() {
        let err = DomainTableParser::default()
            .parse_str("ctg1_12 - 310 Lant_dehydr_N\n")
            .unwrap_err();
        assert!(matches!(err, EngineError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_writer_output_reads_back() {
        let parsed = DomainTableParser::default().parse_str(HMMSEARCH_DOMTAB).unwrap();

        let mut buffer = Vec::new();
        let rows = DomainTableWriter::new().write_all(&mut buffer, &parsed).unwrap();
        assert_eq!(rows, 3);

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with('#')).count(), 3);

        let reparsed = DomainTableParser::default().parse_str(&text).unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].hits.len(), 2);
        assert_eq!(reparsed[0].hits[0].domains[1].env_to, 308);
        assert_eq!(reparsed[0].hits[0].description, parsed[0].hits[0].description);
    }

    #[test]
    fn test_writer_emits_header_once() {
        let mut first = QueryResult::new("q1");
        let mut hit = Hit::new("t1", 1e-5, 20.0, 0.0);
        hit.domains.push(Domain {
            index: 1,
            c_evalue: 1e-5,
            i_evalue: 1e-5,
            bitscore: 20.0,
            bias: 0.0,
            hmm_from: 1,
            hmm_to: 10,
            ali_from: 1,
            ali_to: 10,
            env_from: 1,
            env_to: 10,
            accuracy: 0.9,
        });
        first.hits.push(hit);
        let mut second = first.clone();
        second.id = "q2".to_string();

        let mut buffer = Vec::new();
        DomainTableWriter::new().write_all(&mut buffer, &[first, second]).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with('#'));
        assert_eq!(text.lines().filter(|l| l.starts_with('#')).count(), 3);
        assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 2);
    }
}
