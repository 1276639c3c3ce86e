//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over ledger commands from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<CommandRecord, String>` for each CSV row:
//!
//! ```no_run
//! use customer_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("Applying: {:?}", command),
//!         Err(e) => println!("Skipping: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual record parsing errors are yielded as Err variants in the iterator
//! - Line numbers are included in error messages for debugging

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::CommandRecord;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous CSV reader
///
/// Reads one row at a time, so memory use does not grow with the file.
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl SyncReader {
    /// Open a command file
    ///
    /// The CSV reader trims whitespace from all fields, allows rows with
    /// trailing optional columns left out, and uses an 8KB buffer.
    ///
    /// # Errors
    ///
    /// Returns an error message if the file could not be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<CommandRecord, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();

        let next = deserializer.next()?;
        self.line_num += 1;
        // +1 for the header row
        let line = self.line_num + 1;

        Some(match next {
            Ok(csv_record) => {
                convert_csv_record(csv_record).map_err(|e| format!("Line {}: {}", line, e))
            }
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}
