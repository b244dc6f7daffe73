//! Storage representations of catalog transactions.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::analytics::domain::transactions::{parse_sale_date, Transaction};

/// A row of the `product_transaction` table.
#[derive(Debug, sqlx::FromRow)]
pub struct ProductTransactionRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sold: bool,
    /// Loaders store `NULL` for sale dates they could not parse.
    pub date_of_sale: Option<DateTime<Utc>>,
    pub image: String,
}

impl From<ProductTransactionRow> for Transaction {
    fn from(row: ProductTransactionRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            category: row.category,
            sold: row.sold,
            date_of_sale: row.date_of_sale,
            image: row.image,
        }
    }
}

/// A transaction as it appears in a JSON export of the product catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTransactionRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sold: bool,
    #[serde(default)]
    pub date_of_sale: String,
    #[serde(default)]
    pub image: String,
}

impl From<ProductTransactionRecord> for Transaction {
    fn from(record: ProductTransactionRecord) -> Self {
        Self {
            date_of_sale: parse_sale_date(&record.date_of_sale),
            id: record.id,
            title: record.title,
            description: record.description,
            price: record.price,
            category: record.category,
            sold: record.sold,
            image: record.image,
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Datelike;

    use super::*;

    #[test]
    fn record_from_catalog_json() {
        let record: ProductTransactionRecord = serde_json::from_str(
            r#"{
                "id": 1,
                "title": "Fjallraven  - Foldsack No. 1 Backpack, Fits 15 Laptops",
                "price": 329.85,
                "description": "Your perfect pack for everyday use and walks in the forest.",
                "category": "men's clothing",
                "image": "https://fakestoreapi.com/img/81fPKd-2AYL._AC_SL1500_.jpg",
                "sold": false,
                "dateOfSale": "2021-11-27T20:29:54+05:30"
            }"#,
        )
        .expect("record should deserialize");

        let transaction = Transaction::from(record);

        assert_eq!(1, transaction.id);
        assert_eq!(329.85, transaction.price);
        assert_eq!(
            Some(11),
            transaction.date_of_sale.map(|date| date.month())
        );
    }

    #[test]
    fn record_with_bad_date_keeps_transaction() {
        let record: ProductTransactionRecord = serde_json::from_str(
            r#"{"id": 2, "title": "Ring", "price": 9.99, "category": "jewelery", "sold": true, "dateOfSale": "soon"}"#,
        )
        .expect("record should deserialize");

        let transaction = Transaction::from(record);

        assert_eq!(None, transaction.date_of_sale);
        assert!(transaction.sold);
    }
}
