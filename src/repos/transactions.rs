use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use tracing::trace;

use crate::{
    analytics::domain::{
        filters::{Filter, MonthScope, TransactionPredicate},
        transactions::Transaction,
    },
    database::PostgresConnection,
    models::ProductTransactionRow,
};

/// The transaction attribute used to group results of
/// [`TransactionStore::group_sum`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupKey {
    Category,
    /// Groups are keyed by [`GroupKey::sold_value`].
    Sold,
}

impl GroupKey {
    /// The group key of sold or unsold transactions. Every store must key
    /// [`GroupKey::Sold`] groups with these values.
    pub fn sold_value(sold: bool) -> &'static str {
        if sold {
            "true"
        } else {
            "false"
        }
    }

    pub fn value_of(&self, transaction: &Transaction) -> String {
        match self {
            Self::Category => transaction.category.clone(),
            Self::Sold => Self::sold_value(transaction.sold).to_owned(),
        }
    }
}

/// The numeric attribute summed by [`TransactionStore::group_sum`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SumField {
    Price,
}

impl SumField {
    pub fn value_of(&self, transaction: &Transaction) -> f64 {
        match self {
            Self::Price => transaction.price,
        }
    }
}

/// The aggregate of one group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroupSum {
    /// The number of transactions in the group.
    pub count: u64,
    pub sum: f64,
}

pub type DynTransactionStore = Arc<dyn TransactionStore>;

/// Read access to the transaction catalog.
///
/// Implementations must be safe to query concurrently. None of the methods
/// modify the catalog.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Count the transactions matching a predicate.
    async fn count(&self, predicate: &TransactionPredicate) -> anyhow::Result<u64>;

    /// List the transactions matching a predicate in ascending ID order.
    ///
    /// # Arguments
    ///
    /// * `predicate` - The condition transactions must satisfy.
    /// * `skip` - The number of matching transactions to skip.
    /// * `limit` - The maximum number of transactions to return. If `None`,
    ///   every remaining match is returned.
    async fn scan(
        &self,
        predicate: &TransactionPredicate,
        skip: u64,
        limit: Option<u64>,
    ) -> anyhow::Result<Vec<Transaction>>;

    /// Group the transactions matching a predicate and aggregate each group.
    ///
    /// The default implementation folds the result of a full [`Self::scan`].
    /// Stores able to aggregate natively should override it.
    ///
    /// # Returns
    ///
    /// A mapping of group values to the group's row count and the sum of
    /// `sum_field`. Groups without matching transactions are absent.
    async fn group_sum(
        &self,
        predicate: &TransactionPredicate,
        group_key: GroupKey,
        sum_field: SumField,
    ) -> anyhow::Result<HashMap<String, GroupSum>> {
        let transactions = self.scan(predicate, 0, None).await?;

        Ok(fold_groups(&transactions, group_key, sum_field))
    }
}

/// Aggregate already loaded transactions into groups.
pub fn fold_groups(
    transactions: &[Transaction],
    group_key: GroupKey,
    sum_field: SumField,
) -> HashMap<String, GroupSum> {
    let mut groups: HashMap<String, GroupSum> = HashMap::new();

    for transaction in transactions {
        let group = groups.entry(group_key.value_of(transaction)).or_default();
        group.count += 1;
        group.sum += sum_field.value_of(transaction);
    }

    groups
}

#[derive(FromRow)]
struct GroupSumRow {
    group_value: String,
    row_count: i64,
    total: f64,
}

const TRANSACTION_COLUMNS: &str =
    "t.id, t.title, t.description, t.price, t.category, t.sold, t.date_of_sale, t.image";

/// Escape the pattern characters of `LIKE` so a term is matched literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for character in term.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    escaped
}

/// Append a `WHERE` clause implementing the predicate.
fn push_predicate(query_builder: &mut QueryBuilder<'_, Postgres>, predicate: &TransactionPredicate) {
    query_builder.push(" WHERE TRUE");

    if let Filter::TextOrPrice(term) = &predicate.filter {
        let pattern = format!("%{}%", escape_like(term.text()));

        query_builder
            .push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern);

        if let Some(price) = term.price() {
            query_builder.push(" OR t.price = ").push_bind(price);
        }

        query_builder.push(")");
    }

    match &predicate.scope {
        MonthScope::None => (),
        MonthScope::AnyYear(month) => {
            // Sale dates without a value never match a month.
            query_builder
                .push(" AND EXTRACT(MONTH FROM t.date_of_sale AT TIME ZONE 'UTC') = ")
                .push_bind(month.number() as i32);
        }
        MonthScope::Window { start, end } => {
            query_builder
                .push(" AND t.date_of_sale >= ")
                .push_bind(*start)
                .push(" AND t.date_of_sale < ")
                .push_bind(*end);
        }
    }
}

fn group_column(group_key: GroupKey) -> String {
    match group_key {
        GroupKey::Category => "t.category".to_owned(),
        GroupKey::Sold => format!(
            "CASE WHEN t.sold THEN '{}' ELSE '{}' END",
            GroupKey::sold_value(true),
            GroupKey::sold_value(false)
        ),
    }
}

fn sum_column(sum_field: SumField) -> &'static str {
    match sum_field {
        SumField::Price => "t.price",
    }
}

/// Build the grouped aggregate behind [`TransactionStore::group_sum`].
fn group_sum_query(
    predicate: &TransactionPredicate,
    group_key: GroupKey,
    sum_field: SumField,
) -> QueryBuilder<'static, Postgres> {
    let mut query_builder = QueryBuilder::new("SELECT ");
    query_builder
        .push(group_column(group_key))
        .push(" AS group_value, COUNT(*) AS row_count, COALESCE(SUM(")
        .push(sum_column(sum_field))
        .push("), 0) AS total FROM product_transaction t");
    push_predicate(&mut query_builder, predicate);
    query_builder.push(" GROUP BY 1");

    query_builder
}

#[async_trait]
impl TransactionStore for PostgresConnection {
    async fn count(&self, predicate: &TransactionPredicate) -> anyhow::Result<u64> {
        trace!(?predicate, "Counting transactions.");

        let mut query_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM product_transaction t");
        push_predicate(&mut query_builder, predicate);

        let count: i64 = query_builder
            .build()
            .fetch_one(&**self)
            .await?
            .try_get(0)?;

        Ok(u64::try_from(count)?)
    }

    async fn scan(
        &self,
        predicate: &TransactionPredicate,
        skip: u64,
        limit: Option<u64>,
    ) -> anyhow::Result<Vec<Transaction>> {
        trace!(?predicate, skip, ?limit, "Scanning transactions.");

        let mut query_builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        query_builder
            .push(TRANSACTION_COLUMNS)
            .push(" FROM product_transaction t");
        push_predicate(&mut query_builder, predicate);

        query_builder
            .push(" ORDER BY t.id OFFSET ")
            .push_bind(i64::try_from(skip)?);

        if let Some(limit) = limit {
            query_builder.push(" LIMIT ").push_bind(i64::try_from(limit)?);
        }

        let transactions = query_builder
            .build()
            .fetch_all(&**self)
            .await?
            .iter()
            .map(ProductTransactionRow::from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?
            .into_iter()
            .map(Transaction::from)
            .collect();

        Ok(transactions)
    }

    async fn group_sum(
        &self,
        predicate: &TransactionPredicate,
        group_key: GroupKey,
        sum_field: SumField,
    ) -> anyhow::Result<HashMap<String, GroupSum>> {
        trace!(?predicate, ?group_key, ?sum_field, "Grouping transactions.");

        let mut query_builder = group_sum_query(predicate, group_key, sum_field);

        let rows = query_builder
            .build()
            .fetch_all(&**self)
            .await?
            .iter()
            .map(GroupSumRow::from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        rows.into_iter()
            .map(|row| -> anyhow::Result<(String, GroupSum)> {
                Ok((
                    row.group_value,
                    GroupSum {
                        count: u64::try_from(row.row_count)?,
                        sum: row.total,
                    },
                ))
            })
            .collect()
    }
}
