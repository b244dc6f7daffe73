use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::analytics::domain::{
    self,
    filters::{ListQuery, QueryValidationError, SaleMonth},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sold: bool,
    pub date_of_sale: Option<String>,
    pub image: String,
}

impl From<&domain::transactions::Transaction> for Transaction {
    fn from(transaction: &domain::transactions::Transaction) -> Self {
        Self {
            id: transaction.id,
            title: transaction.title.clone(),
            description: transaction.description.clone(),
            price: transaction.price,
            category: transaction.category.clone(),
            sold: transaction.sold,
            date_of_sale: transaction
                .date_of_sale
                .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            image: transaction.image.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub data: Vec<Transaction>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl From<domain::reports::TransactionPage> for TransactionPage {
    fn from(page: domain::reports::TransactionPage) -> Self {
        Self {
            data: page.items.iter().map(Transaction::from).collect(),
            total: page.total,
            page: page.page.page(),
            per_page: page.page.per_page(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_sale_amount: f64,
    pub sold_items: u64,
    pub not_sold_items: u64,
}

impl From<domain::reports::StatisticsResult> for Statistics {
    fn from(statistics: domain::reports::StatisticsResult) -> Self {
        Self {
            total_sale_amount: statistics.total_sale_amount,
            sold_items: statistics.sold_count,
            not_sold_items: statistics.not_sold_count,
        }
    }
}

/// One bar of the price range chart.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct PriceRange {
    pub range: String,
    pub count: u64,
}

impl From<domain::reports::HistogramBucket> for PriceRange {
    fn from(bucket: domain::reports::HistogramBucket) -> Self {
        Self {
            range: bucket.range_label,
            count: bucket.count,
        }
    }
}

/// One slice of the category chart.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

impl From<domain::reports::CategoryCount> for CategoryCount {
    fn from(category: domain::reports::CategoryCount) -> Self {
        Self {
            category: category.category,
            count: category.count,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Combined {
    pub transactions: Vec<Transaction>,
    pub statistics: Statistics,
    pub histogram: Vec<PriceRange>,
    pub categories: Vec<CategoryCount>,
}

impl From<domain::reports::CombinedResult> for Combined {
    fn from(combined: domain::reports::CombinedResult) -> Self {
        Self {
            transactions: combined.transactions.iter().map(Transaction::from).collect(),
            statistics: combined.statistics.into(),
            histogram: combined.histogram.into_iter().map(Into::into).collect(),
            categories: combined.categories.into_iter().map(Into::into).collect(),
        }
    }
}

/// Query parameters of the transaction listing.
///
/// Values are taken as strings so malformed numbers produce the same error
/// body as out of range ones.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl TryFrom<ListParams> for ListQuery {
    type Error = QueryValidationError;

    fn try_from(params: ListParams) -> Result<Self, Self::Error> {
        let page = parse_integer_param("page", params.page.as_deref())?;
        let per_page = parse_integer_param("perPage", params.per_page.as_deref())?;

        ListQuery::new(params.search.as_deref(), page, per_page)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthParams {
    pub month: Option<String>,
}

impl MonthParams {
    pub fn sale_month(&self) -> Result<Option<SaleMonth>, QueryValidationError> {
        parse_sale_month(self.month.as_deref())
    }
}

/// Parse an optional month given as text. Blank values count as missing.
pub fn parse_sale_month(month: Option<&str>) -> Result<Option<SaleMonth>, QueryValidationError> {
    parse_integer_param("month", month)?
        .map(SaleMonth::new)
        .transpose()
}

fn parse_integer_param(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<i64>, QueryValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| QueryValidationError::NotAnInteger {
                field,
                value: text.to_owned(),
            }),
    }
}
