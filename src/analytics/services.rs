use std::{fmt, future::Future, time::Duration};

use anyhow::anyhow;
use thiserror::Error;
use tracing::debug;

use crate::repos::{DynTransactionStore, GroupKey, SumField};

use super::domain::{
    filters::{
        ListQuery, MonthPolicy, MonthScope, QueryValidationError, SaleMonth, TransactionPredicate,
    },
    reports::{
        CategoryCount, CombinedResult, HistogramBucket, PriceHistogram, StatisticsResult,
        TransactionPage,
    },
    transactions::Transaction,
};

/// The queries the analytics service answers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnalyticsQuery {
    Transactions,
    Statistics,
    Histogram,
    Categories,
}

impl fmt::Display for AnalyticsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transactions => "transactions",
            Self::Statistics => "statistics",
            Self::Histogram => "histogram",
            Self::Categories => "categories",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The caller's parameters were malformed. Nothing was computed.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryValidationError),

    /// The transaction store failed or did not answer in time. Retrying the
    /// request may succeed.
    #[error("transaction store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    /// One part of a combined query failed, so the combined query failed as a
    /// whole.
    #[error("{query} query failed: {source}")]
    PartialAggregationFailure {
        query: AnalyticsQuery,
        source: Box<AnalyticsError>,
    },
}

/// A service object answering analytical queries over the transaction catalog.
///
/// The service holds no state besides its configuration; every result is
/// recomputed from the store.
#[derive(Clone)]
pub struct AnalyticsService {
    month_policy: MonthPolicy,
    query_timeout: Option<Duration>,
    store: DynTransactionStore,
}

impl AnalyticsService {
    /// Create a new analytics service.
    ///
    /// # Arguments
    ///
    /// * `store` - The store to read transactions from.
    /// * `month_policy` - How requested months are matched against sale
    ///   dates. The same policy is used by every month-scoped query.
    pub fn new(store: DynTransactionStore, month_policy: MonthPolicy) -> Self {
        Self {
            month_policy,
            query_timeout: None,
            store,
        }
    }

    /// Abandon any query that takes longer than `timeout`.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// List one page of transactions matching a search.
    pub async fn list_transactions(
        &self,
        query: ListQuery,
    ) -> Result<TransactionPage, AnalyticsError> {
        self.bounded(self.fetch_page(query)).await
    }

    /// Count sold and unsold transactions in a month and total the sales.
    pub async fn statistics(
        &self,
        month: Option<SaleMonth>,
    ) -> Result<StatisticsResult, AnalyticsError> {
        let scope = self.month_scope(month);

        self.bounded(self.compute_statistics(&scope)).await
    }

    /// Count the transactions of a month in each of the ten price ranges.
    pub async fn price_histogram(
        &self,
        month: Option<SaleMonth>,
    ) -> Result<Vec<HistogramBucket>, AnalyticsError> {
        let scope = self.month_scope(month);

        self.bounded(self.compute_histogram(&scope)).await
    }

    /// Count the transactions of a month in each category present that month.
    pub async fn category_distribution(
        &self,
        month: Option<SaleMonth>,
    ) -> Result<Vec<CategoryCount>, AnalyticsError> {
        let scope = self.month_scope(month);

        self.bounded(self.compute_categories(&scope)).await
    }

    /// Compute the full catalog listing, statistics, histogram and category
    /// distribution concurrently.
    ///
    /// If any of the four queries fails, the others are abandoned and the
    /// error of the failed query is returned.
    pub async fn combined(
        &self,
        month: Option<SaleMonth>,
    ) -> Result<CombinedResult, AnalyticsError> {
        let scope = self.month_scope(month);

        self.bounded(async {
            let (transactions, statistics, histogram, categories) = tokio::try_join!(
                labelled(AnalyticsQuery::Transactions, self.fetch_all()),
                labelled(AnalyticsQuery::Statistics, self.compute_statistics(&scope)),
                labelled(AnalyticsQuery::Histogram, self.compute_histogram(&scope)),
                labelled(AnalyticsQuery::Categories, self.compute_categories(&scope)),
            )?;

            Ok(CombinedResult {
                transactions,
                statistics,
                histogram,
                categories,
            })
        })
        .await
    }

    fn month_scope(&self, month: Option<SaleMonth>) -> MonthScope {
        let scope = self.month_policy.scope(month);
        debug!(?month, policy = ?self.month_policy, ?scope, "Resolved month scope.");

        scope
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, AnalyticsError>>,
    ) -> Result<T, AnalyticsError> {
        match self.query_timeout {
            None => operation.await,
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| {
                    debug!(?limit, "Abandoning query after timeout.");

                    AnalyticsError::StoreUnavailable(anyhow!(
                        "query did not complete within {:?}",
                        limit
                    ))
                })?,
        }
    }

    async fn fetch_page(&self, query: ListQuery) -> Result<TransactionPage, AnalyticsError> {
        let predicate = TransactionPredicate::search(query.filter);
        let page = query.page;

        let (items, total) = tokio::try_join!(
            self.store.scan(&predicate, page.skip(), Some(page.limit())),
            self.store.count(&predicate),
        )
        .map_err(AnalyticsError::StoreUnavailable)?;

        Ok(TransactionPage { items, total, page })
    }

    async fn fetch_all(&self) -> Result<Vec<Transaction>, AnalyticsError> {
        self.store
            .scan(&TransactionPredicate::all(), 0, None)
            .await
            .map_err(AnalyticsError::StoreUnavailable)
    }

    async fn compute_statistics(
        &self,
        scope: &MonthScope,
    ) -> Result<StatisticsResult, AnalyticsError> {
        let groups = self
            .store
            .group_sum(
                &TransactionPredicate::in_scope(scope.clone()),
                GroupKey::Sold,
                SumField::Price,
            )
            .await
            .map_err(AnalyticsError::StoreUnavailable)?;

        let sold = groups
            .get(GroupKey::sold_value(true))
            .copied()
            .unwrap_or_default();
        let not_sold = groups
            .get(GroupKey::sold_value(false))
            .copied()
            .unwrap_or_default();

        Ok(StatisticsResult {
            total_sale_amount: sold.sum,
            sold_count: sold.count,
            not_sold_count: not_sold.count,
        })
    }

    async fn compute_histogram(
        &self,
        scope: &MonthScope,
    ) -> Result<Vec<HistogramBucket>, AnalyticsError> {
        let transactions = self
            .store
            .scan(&TransactionPredicate::in_scope(scope.clone()), 0, None)
            .await
            .map_err(AnalyticsError::StoreUnavailable)?;

        let histogram = transactions
            .iter()
            .map(|transaction| transaction.price)
            .collect::<PriceHistogram>();

        Ok(histogram.buckets())
    }

    async fn compute_categories(
        &self,
        scope: &MonthScope,
    ) -> Result<Vec<CategoryCount>, AnalyticsError> {
        let groups = self
            .store
            .group_sum(
                &TransactionPredicate::in_scope(scope.clone()),
                GroupKey::Category,
                SumField::Price,
            )
            .await
            .map_err(AnalyticsError::StoreUnavailable)?;

        let mut categories = groups
            .into_iter()
            .filter(|(_, group)| group.count > 0)
            .map(|(category, group)| CategoryCount {
                category,
                count: group.count,
            })
            .collect::<Vec<_>>();
        categories.sort_by(|a, b| a.category.cmp(&b.category));

        Ok(categories)
    }
}

/// Attribute the failure of one part of a combined query to that part.
async fn labelled<T>(
    query: AnalyticsQuery,
    operation: impl Future<Output = Result<T, AnalyticsError>>,
) -> Result<T, AnalyticsError> {
    operation
        .await
        .map_err(|error| AnalyticsError::PartialAggregationFailure {
            query,
            source: Box::new(error),
        })
}
