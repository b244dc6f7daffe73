use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::{
    analytics::domain::{filters::TransactionPredicate, transactions::Transaction},
    models::ProductTransactionRecord,
};

use super::TransactionStore;

/// A transaction store holding the whole catalog in memory.
///
/// The catalog is immutable once the store is built. Clones share the same
/// data.
#[derive(Clone, Default)]
pub struct InMemoryTransactionStore {
    transactions: Arc<Vec<Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new(mut transactions: Vec<Transaction>) -> Self {
        transactions.sort_by_key(|transaction| transaction.id);

        Self {
            transactions: Arc::new(transactions),
        }
    }

    /// Build a store from a JSON export of the catalog.
    ///
    /// # Arguments
    ///
    /// * `json` - An array of catalog records. Records with sale dates that
    ///   cannot be parsed are kept, but never match a month.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let records: Vec<ProductTransactionRecord> = serde_json::from_str(json)?;

        Ok(Self::new(
            records.into_iter().map(Transaction::from).collect(),
        ))
    }

    fn matching<'a>(
        &'a self,
        predicate: &'a TransactionPredicate,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.transactions
            .iter()
            .filter(move |transaction| predicate.matches(transaction))
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn count(&self, predicate: &TransactionPredicate) -> anyhow::Result<u64> {
        Ok(self.matching(predicate).count() as u64)
    }

    async fn scan(
        &self,
        predicate: &TransactionPredicate,
        skip: u64,
        limit: Option<u64>,
    ) -> anyhow::Result<Vec<Transaction>> {
        trace!(?predicate, skip, ?limit, "Scanning in-memory transactions.");

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |limit| {
            usize::try_from(limit).unwrap_or(usize::MAX)
        });

        Ok(self
            .matching(predicate)
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }
}
