//! Asynchronous CSV reader with batch interface
//!
//! Provides a streaming interface over ledger commands from a CSV file,
//! handing them out in batches for the async strategy.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of CommandRecords
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```
//!
//! Rows that fail to parse are logged with their line number and skipped.

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::CommandRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Wrap an async byte source
    ///
    /// Configured like the sync reader: trimmed fields, flexible row length.
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read up to `batch_size` valid commands
    ///
    /// # Returns
    ///
    /// The parsed commands in file order; an empty batch means end of input.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<CommandRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(next) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match next.map_err(|e| format!("CSV parse error: {}", e)) {
                Ok(csv_record) => match convert_csv_record(csv_record) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(line, error = %e, "Skipping record"),
                },
                Err(e) => warn!(line, error = %e, "Skipping record"),
            }
        }

        batch
    }
}
