//! CSV export of every loaded record, not just the visible page.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::info;

use crate::records::{format_display_date, MarketRecord};

pub const CSV_FILENAME: &str = "market_data.csv";
pub const CSV_HEADERS: [&str; 7] = [
    "Market",
    "State",
    "District",
    "Commodity",
    "Variety",
    "Price",
    "Date",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no data available to export")]
    NoData,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
    pub row_count: usize,
}

impl CsvExport {
    /// Writes `market_data.csv` into `dir` via a temp file and rename.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        let tmp_path = dir.join(format!("{}.tmp", self.filename));

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(self.content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        info!(
            component = "export",
            event = "export.csv.saved",
            path = %path.display(),
            rows = self.row_count
        );
        Ok(path)
    }
}

/// Header row unquoted; the six text columns always quoted with standard
/// escaping, price left bare in major units.
pub fn records_to_csv(records: &[MarketRecord]) -> Result<CsvExport, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut header = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    header.write_record(CSV_HEADERS)?;
    let buf = header
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;

    // Cells arrive already quoted, so the row writer must not quote again.
    let mut body = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buf);
    for record in records {
        body.write_record([
            quoted_cell(&record.market)?,
            quoted_cell(&record.state)?,
            quoted_cell(&record.district)?,
            quoted_cell(&record.commodity)?,
            quoted_cell(&record.variety)?,
            record.price_major().to_string(),
            quoted_cell(&format_display_date(&record.date))?,
        ])?;
    }
    let bytes = body
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;

    Ok(CsvExport {
        filename: CSV_FILENAME.to_string(),
        content: String::from_utf8(bytes)?,
        row_count: records.len(),
    })
}

fn quoted_cell(text: &str) -> Result<String, ExportError> {
    let mut cell = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());
    cell.write_field(text)?;
    let bytes = cell
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}
