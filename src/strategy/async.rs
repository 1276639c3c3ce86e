//! Asynchronous batch processing strategy
//!
//! This module provides an asynchronous, multi-threaded implementation of the
//! ProcessingStrategy trait. It applies commands in batches, running different
//! customers in parallel.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── LedgerSettings (ledger config, clock, overdue scan)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (customer partitioning + tokio tasks)
//!         └── Ledger (DashMap-backed stores and engines)
//! ```
//!
//! # Ordering
//!
//! - Batches are processed one after another, so a customer whose commands
//!   span several batches still sees them in file order
//! - Within a batch, each customer's commands run sequentially on one task
//! - Different customers run concurrently on the multi-threaded runtime

use crate::core::BatchProcessor;
use crate::io::async_reader::AsyncReader;
use crate::strategy::{log_rejected, LedgerSettings, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for batch processing
///
/// # Fields
///
/// * `batch_size` - Number of commands to read before processing a batch
/// * `max_concurrent_batches` - Worker threads of the tokio runtime
#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                fallback = default.batch_size,
                "Invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                fallback = default.max_concurrent_batches,
                "Invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Multi-threaded batch pipeline
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    settings: LedgerSettings,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, settings: LedgerSettings) -> Self {
        Self { config, settings }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let ledger = Arc::new(self.settings.build_ledger());
            let processor = BatchProcessor::new(Arc::clone(&ledger));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut batches = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                batches += 1;

                // Wait for the whole batch before reading on
                for result in processor.process_batch(batch).await {
                    if let Err(e) = &result.result {
                        log_rejected(result.command.customer, e);
                    }
                }
            }
            debug!(batches, "Finished replaying commands");

            self.settings.finish(&ledger, output)
        })
    }
}
