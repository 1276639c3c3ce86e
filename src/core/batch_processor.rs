//! Batch processing with customer-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies a batch of
//! imported commands concurrently while keeping each customer's commands in
//! file order.
//!
//! # Design
//!
//! Customers never share ledger state, so a batch is split into one partition
//! per customer and each partition runs on its own tokio task. Within a
//! partition commands are applied strictly in sequence, which is what makes
//! labels created by earlier rows visible to later ones.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<Ledger>  (shared stores and engines)
//! ```
//!
//! # Thread Safety
//!
//! The processor is cloneable and can be shared across async tasks; the
//! ledger behind it is `DashMap`-backed.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use super::ledger::Ledger;
use crate::types::{CommandRecord, CustomerId, LedgerError};

/// Result of applying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was applied
    pub command: CommandRecord,

    /// Success or the error the ledger reported
    pub result: Result<(), LedgerError>,
}

/// Batch processor with customer-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    ledger: Arc<Ledger>,
}

impl BatchProcessor {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Split a batch into per-customer partitions, preserving order
    pub fn partition_by_customer(
        &self,
        batch: Vec<CommandRecord>,
    ) -> HashMap<CustomerId, Vec<CommandRecord>> {
        let mut partitions: HashMap<CustomerId, Vec<CommandRecord>> = HashMap::new();

        for command in batch {
            partitions.entry(command.customer).or_default().push(command);
        }

        partitions
    }

    /// Apply one customer's commands in order
    pub async fn process_customer_commands(
        &self,
        commands: Vec<CommandRecord>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.ledger.process(command.clone());
            results.push(ProcessingResult { command, result });
        }

        results
    }

    /// Apply a batch, running customers concurrently
    ///
    /// # Returns
    ///
    /// One result per command. Results of different customers are not in
    /// file order.
    pub async fn process_batch(&self, batch: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let partitions = self.partition_by_customer(batch);

        let mut tasks = Vec::with_capacity(partitions.len());
        for (_customer, commands) in partitions {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_customer_commands(commands).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(customer_results) => results.extend(customer_results),
                Err(e) => error!(error = %e, "Customer partition task failed"),
            }
        }

        results
    }
}
