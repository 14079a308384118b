//! Rendering result batches as text, JSON lines or CSV

use crate::asn::Response;
use crate::runner::Batch;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Column separator for CSV output
pub const CSV_SEPARATOR: &str = "|";

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One CIDR per line, IPv4 only unless IPv6 is enabled
    #[default]
    Text,
    /// One JSON object per record
    Json,
    /// `|`-separated values with a header row
    Csv,
}

/// JSON output structure for a single record
#[derive(Debug, Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    input: &'a str,
    as_number: String,
    as_name: &'a str,
    as_country: &'a str,
    as_range: Vec<String>,
}

/// Renders batches in one output format
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    format: OutputFormat,
    include_ipv6: bool,
}

impl Formatter {
    /// Create a formatter; text output hides IPv6 ranges unless `include_ipv6`
    /// is set, JSON and CSV always carry every record
    pub fn new(format: OutputFormat, include_ipv6: bool) -> Self {
        Self {
            format,
            include_ipv6,
        }
    }

    /// Header line to print before any record, if the format has one
    pub fn header(&self) -> Option<String> {
        match self.format {
            OutputFormat::Csv => Some(
                ["timestamp", "input", "as_number", "as_name", "as_country", "as_range"]
                    .join(CSV_SEPARATOR),
            ),
            OutputFormat::Text | OutputFormat::Json => None,
        }
    }

    /// Render every record of a batch as output lines
    pub fn format_batch(&self, batch: &Batch, now: DateTime<Utc>) -> Vec<String> {
        let input = batch.query.display_input();
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        batch
            .records
            .iter()
            .flat_map(|r| self.format_record(r, input, &timestamp))
            .collect()
    }

    fn format_record(&self, record: &Response, input: &str, timestamp: &str) -> Vec<String> {
        let ranges: Vec<String> = record.cidrs().iter().map(ToString::to_string).collect();
        match self.format {
            OutputFormat::Text if record.is_ipv6() && !self.include_ipv6 => Vec::new(),
            OutputFormat::Text if ranges.is_empty() => vec![format!(
                "{input}: AS{} {} [{}]",
                record.asn, record.org, record.country
            )],
            OutputFormat::Text => ranges,
            OutputFormat::Json => {
                let json = JsonRecord {
                    timestamp: timestamp.to_string(),
                    input,
                    as_number: format!("AS{}", record.asn),
                    as_name: &record.org,
                    as_country: &record.country,
                    as_range: ranges,
                };
                match serde_json::to_string(&json) {
                    Ok(line) => vec![line],
                    Err(e) => {
                        tracing::warn!(error = %e, "could not serialize record");
                        Vec::new()
                    }
                }
            }
            OutputFormat::Csv => {
                let asn = format!("AS{}", record.asn);
                let ranges = ranges.join(",");
                let columns = [
                    timestamp,
                    input,
                    asn.as_str(),
                    record.org.as_str(),
                    record.country.as_str(),
                    ranges.as_str(),
                ];
                vec![columns.join(CSV_SEPARATOR)]
            }
        }
    }
}
