pub mod filters;
pub mod reports;
pub mod transactions;
