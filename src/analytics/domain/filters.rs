//! Predicates used to select transactions from the store.
//!
//! A [`TransactionPredicate`] combines a free-text [`Filter`] with a
//! [`MonthScope`]. Stores either evaluate predicates directly through
//! [`TransactionPredicate::matches`] or translate the variants into their own
//! query language.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use thiserror::Error;

use super::transactions::Transaction;

/// Reasons a caller-provided query is rejected before it reaches the store.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum QueryValidationError {
    #[error("month must be between 1 and 12, got {0}")]
    MonthOutOfRange(i64),

    #[error("page must be a positive integer, got {0}")]
    NonPositivePage(i64),

    #[error("perPage must be a positive integer, got {0}")]
    NonPositivePageSize(i64),

    #[error("perPage may not be larger than {max}, got {requested}")]
    PageSizeTooLarge { max: u32, requested: i64 },

    #[error("page may not be larger than {max}, got {requested}")]
    PageTooLarge { max: u32, requested: i64 },

    #[error("{field} must be an integer, got {value:?}")]
    NotAnInteger { field: &'static str, value: String },
}

/// The year of a year-window policy cannot be represented as a calendar date.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("year {0} is outside the supported calendar range")]
pub struct YearOutOfRange(pub i32);

/// A calendar month, always in the range `1..=12`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SaleMonth(u32);

impl SaleMonth {
    /// Validate a month number.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sales_analytics_api::analytics::domain::filters::SaleMonth;
    /// assert_eq!(3, SaleMonth::new(3).unwrap().number());
    /// assert!(SaleMonth::new(13).is_err());
    /// ```
    pub fn new(month: i64) -> Result<Self, QueryValidationError> {
        match u32::try_from(month) {
            Ok(number @ 1..=12) => Ok(Self(number)),
            _ => Err(QueryValidationError::MonthOutOfRange(month)),
        }
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

/// The rule deciding which sales belong to a requested month.
///
/// The policy is chosen once when the analytics service is built and applies
/// to every month-scoped query it answers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonthPolicy {
    /// Match the month of the sale date in any year. March 2021 and March
    /// 2024 both match month 3.
    AnyYear,
    /// Match the month within one specific calendar year only.
    YearWindow(CalendarYear),
}

impl MonthPolicy {
    /// Build a year-window policy, rejecting years without a full calendar.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sales_analytics_api::analytics::domain::filters::MonthPolicy;
    /// assert!(MonthPolicy::year_window(2022).is_ok());
    /// assert!(MonthPolicy::year_window(300_000).is_err());
    /// ```
    pub fn year_window(year: i32) -> Result<Self, YearOutOfRange> {
        Ok(Self::YearWindow(CalendarYear::new(year)?))
    }

    /// Resolve the scope to use for a requested month.
    ///
    /// Requests without a month are unscoped regardless of the policy.
    pub fn scope(&self, month: Option<SaleMonth>) -> MonthScope {
        match (self, month) {
            (_, None) => MonthScope::None,
            (Self::AnyYear, Some(month)) => MonthScope::AnyYear(month),
            (Self::YearWindow(year), Some(month)) => year.month_window(month),
        }
    }
}

/// A year whose twelve month windows are all representable.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct CalendarYear {
    year: i32,
    /// The half-open `[start, end)` interval of each month, January first.
    months: [(DateTime<Utc>, DateTime<Utc>); 12],
}

impl CalendarYear {
    pub fn new(year: i32) -> Result<Self, YearOutOfRange> {
        let next_year = year.checked_add(1).ok_or(YearOutOfRange(year))?;

        let months = (1..=12)
            .map(|month| {
                let (end_year, end_month) = match month {
                    12 => (next_year, 1),
                    month => (year, month + 1),
                };

                first_instant_of(year, month).zip(first_instant_of(end_year, end_month))
            })
            .collect::<Option<Vec<_>>>()
            .and_then(|months| <[_; 12]>::try_from(months).ok())
            .ok_or(YearOutOfRange(year))?;

        Ok(Self { year, months })
    }

    fn month_window(&self, month: SaleMonth) -> MonthScope {
        let (start, end) = self.months[month.number() as usize - 1];

        MonthScope::Window { start, end }
    }
}

impl fmt::Debug for CalendarYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CalendarYear").field(&self.year).finish()
    }
}

fn first_instant_of(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// The set of sale dates a query is restricted to.
#[derive(Clone, Debug, PartialEq)]
pub enum MonthScope {
    /// No restriction. Transactions with unparseable dates are included.
    None,
    /// Sales in the given month of any year.
    AnyYear(SaleMonth),
    /// Sales in the half-open interval `[start, end)`.
    Window {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl MonthScope {
    /// Determine if a sale date falls inside the scope.
    pub fn contains(&self, date_of_sale: Option<DateTime<Utc>>) -> bool {
        match self {
            Self::None => true,
            Self::AnyYear(month) => {
                date_of_sale.map_or(false, |date| date.month() == month.number())
            }
            Self::Window { start, end } => {
                date_of_sale.map_or(false, |date| *start <= date && date < *end)
            }
        }
    }
}

/// A search term matched against a transaction's text and price.
///
/// Text is compared after Unicode lowercasing with [`str::to_lowercase`].
/// The Postgres store searches with `ILIKE` instead, which folds case by the
/// database's `LC_CTYPE`. The two agree on ASCII but can disagree on letters
/// with special case mappings such as dotted `İ` or `ß`.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchTerm {
    text: String,
    lowercase: String,
    price: Option<f64>,
}

impl SearchTerm {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            lowercase: text.to_lowercase(),
            price: text.trim().parse::<f64>().ok().filter(|price| price.is_finite()),
        }
    }

    /// The term exactly as provided.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The price to compare against, if the term is numeric.
    pub fn price(&self) -> Option<f64> {
        self.price
    }

    fn matches(&self, transaction: &Transaction) -> bool {
        transaction.title.to_lowercase().contains(&self.lowercase)
            || transaction
                .description
                .to_lowercase()
                .contains(&self.lowercase)
            || self.price.map_or(false, |price| transaction.price == price)
    }
}

/// A free-text filter over the catalog.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    /// Case-insensitive substring match on title or description, or an exact
    /// price match when the term is numeric.
    TextOrPrice(SearchTerm),
}

impl Filter {
    /// Build a filter from an optional search string. Missing and empty
    /// strings match everything.
    pub fn from_search(search: Option<&str>) -> Self {
        match search {
            Some(text) if !text.is_empty() => Self::TextOrPrice(SearchTerm::new(text)),
            _ => Self::All,
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            Self::All => true,
            Self::TextOrPrice(term) => term.matches(transaction),
        }
    }
}

/// The complete predicate handed to a transaction store.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionPredicate {
    pub filter: Filter,
    pub scope: MonthScope,
}

impl TransactionPredicate {
    /// A predicate matching every transaction.
    pub fn all() -> Self {
        Self {
            filter: Filter::All,
            scope: MonthScope::None,
        }
    }

    pub fn search(filter: Filter) -> Self {
        Self {
            filter,
            scope: MonthScope::None,
        }
    }

    pub fn in_scope(scope: MonthScope) -> Self {
        Self {
            filter: Filter::All,
            scope,
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.filter.matches(transaction) && self.scope.contains(transaction.date_of_sale)
    }
}

/// A validated page of a listing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 100;

    /// Validate pagination parameters, applying defaults for missing values.
    ///
    /// # Arguments
    /// * `page` - The 1-based page number.
    /// * `per_page` - The maximum number of items on a page.
    ///
    /// # Returns
    ///
    /// An error if either value is not positive or the page size is larger
    /// than [`Self::MAX_PER_PAGE`]. Out of range values are never clamped.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Result<Self, QueryValidationError> {
        let page = match page {
            None => Self::DEFAULT_PAGE,
            Some(value) if value < 1 => return Err(QueryValidationError::NonPositivePage(value)),
            Some(value) => {
                u32::try_from(value).map_err(|_| QueryValidationError::PageTooLarge {
                    max: u32::MAX,
                    requested: value,
                })?
            }
        };

        let per_page = match per_page {
            None => Self::DEFAULT_PER_PAGE,
            Some(value) if value < 1 => {
                return Err(QueryValidationError::NonPositivePageSize(value))
            }
            Some(value) if value > i64::from(Self::MAX_PER_PAGE) => {
                return Err(QueryValidationError::PageSizeTooLarge {
                    max: Self::MAX_PER_PAGE,
                    requested: value,
                })
            }
            Some(value) => value as u32,
        };

        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// The number of matching records before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// Parameters for a paginated, searchable listing.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub page: PageRequest,
}

impl ListQuery {
    pub fn new(
        search: Option<&str>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Self, QueryValidationError> {
        Ok(Self {
            filter: Filter::from_search(search),
            page: PageRequest::new(page, per_page)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn transaction(title: &str, description: &str, price: f64) -> Transaction {
        Transaction {
            id: 1,
            title: title.to_owned(),
            description: description.to_owned(),
            price,
            category: "electronics".to_owned(),
            sold: false,
            date_of_sale: None,
            image: String::new(),
        }
    }

    fn utc(year: i32, month: u32, day: u32, hour: u32) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    #[test]
    fn month_range() {
        assert!(SaleMonth::new(1).is_ok());
        assert!(SaleMonth::new(12).is_ok());
        assert_eq!(
            Err(QueryValidationError::MonthOutOfRange(0)),
            SaleMonth::new(0)
        );
        assert_eq!(
            Err(QueryValidationError::MonthOutOfRange(-3)),
            SaleMonth::new(-3)
        );
        assert_eq!(
            Err(QueryValidationError::MonthOutOfRange(13)),
            SaleMonth::new(13)
        );
    }

    #[test]
    fn empty_search_matches_everything() {
        assert_eq!(Filter::All, Filter::from_search(None));
        assert_eq!(Filter::All, Filter::from_search(Some("")));
    }

    #[test]
    fn search_is_case_insensitive_on_title_and_description() {
        let filter = Filter::from_search(Some("JACKET"));

        assert!(filter.matches(&transaction("Mens Casual Slim Fit Jacket", "", 15.99)));
        assert!(filter.matches(&transaction("Coat", "a warm jacket for winter", 15.99)));
        assert!(!filter.matches(&transaction("Backpack", "fits a laptop", 109.95)));
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let filter = Filter::from_search(Some("ÉCHARPE"));

        assert!(filter.matches(&transaction("Écharpe en laine", "", 35.0)));
        assert!(filter.matches(&transaction("Scarf", "une écharpe chaude", 35.0)));
    }

    #[test]
    fn numeric_search_matches_exact_price() {
        let filter = Filter::from_search(Some("109.95"));

        assert!(filter.matches(&transaction("Backpack", "", 109.95)));
        assert!(!filter.matches(&transaction("Backpack", "", 109.9)));
    }

    #[test]
    fn non_numeric_search_drops_price_clause() {
        let filter = Filter::from_search(Some("ring"));

        match &filter {
            Filter::TextOrPrice(term) => assert_eq!(None, term.price()),
            Filter::All => panic!("expected a text filter"),
        }
        assert!(!filter.matches(&transaction("Backpack", "", 0.0)));
    }

    #[test]
    fn non_finite_search_drops_price_clause() {
        match Filter::from_search(Some("NaN")) {
            Filter::TextOrPrice(term) => assert_eq!(None, term.price()),
            Filter::All => panic!("expected a text filter"),
        }
    }

    #[test]
    fn any_year_scope_ignores_year() {
        let scope = MonthPolicy::AnyYear.scope(Some(SaleMonth::new(3).unwrap()));

        assert!(scope.contains(utc(2024, 3, 5, 0)));
        assert!(scope.contains(utc(2019, 3, 31, 23)));
        assert!(!scope.contains(utc(2024, 4, 1, 0)));
        assert!(!scope.contains(None));
    }

    #[test]
    fn year_window_scope_matches_single_year() {
        let scope = MonthPolicy::year_window(2022)
            .unwrap()
            .scope(Some(SaleMonth::new(3).unwrap()));

        assert!(scope.contains(utc(2022, 3, 1, 0)));
        assert!(scope.contains(utc(2022, 3, 31, 23)));
        assert!(!scope.contains(utc(2021, 3, 15, 0)));
        assert!(!scope.contains(utc(2022, 4, 1, 0)));
        assert!(!scope.contains(None));
    }

    #[test]
    fn year_window_for_december_ends_in_january() {
        let scope = MonthPolicy::year_window(2021)
            .unwrap()
            .scope(Some(SaleMonth::new(12).unwrap()));

        assert_eq!(
            MonthScope::Window {
                start: utc(2021, 12, 1, 0).unwrap(),
                end: utc(2022, 1, 1, 0).unwrap(),
            },
            scope
        );
    }

    #[test]
    fn year_window_outside_calendar_is_rejected() {
        assert_eq!(
            Err(YearOutOfRange(i32::MAX)),
            MonthPolicy::year_window(i32::MAX)
        );
        assert_eq!(
            Err(YearOutOfRange(300_000)),
            MonthPolicy::year_window(300_000)
        );
        assert_eq!(Err(YearOutOfRange(-300_000)), CalendarYear::new(-300_000));
    }

    #[test]
    fn calendar_year_covers_every_month() {
        let year = CalendarYear::new(2024).unwrap();

        assert_eq!("CalendarYear(2024)", format!("{:?}", year));

        let february = year.month_window(SaleMonth::new(2).unwrap());
        assert_eq!(
            MonthScope::Window {
                start: utc(2024, 2, 1, 0).unwrap(),
                end: utc(2024, 3, 1, 0).unwrap(),
            },
            february
        );
        assert!(february.contains(utc(2024, 2, 29, 23)));
    }

    #[test]
    fn missing_month_is_unscoped() {
        assert_eq!(
            MonthScope::None,
            MonthPolicy::year_window(2022).unwrap().scope(None)
        );
        assert!(MonthScope::None.contains(None));
    }

    #[test]
    fn predicate_requires_filter_and_scope() {
        let predicate = TransactionPredicate {
            filter: Filter::from_search(Some("shirt")),
            scope: MonthScope::AnyYear(SaleMonth::new(6).unwrap()),
        };

        let mut shirt = transaction("T-Shirt", "", 22.3);
        shirt.date_of_sale = utc(2021, 6, 2, 10);
        assert!(predicate.matches(&shirt));

        shirt.date_of_sale = utc(2021, 7, 2, 10);
        assert!(!predicate.matches(&shirt));
    }

    #[test]
    fn page_defaults() {
        let page = PageRequest::new(None, None).unwrap();

        assert_eq!(1, page.page());
        assert_eq!(10, page.per_page());
        assert_eq!(0, page.skip());
        assert_eq!(PageRequest::default(), page);
    }

    #[test]
    fn page_offsets() {
        let page = PageRequest::new(Some(3), Some(10)).unwrap();

        assert_eq!(20, page.skip());
        assert_eq!(10, page.limit());
    }

    #[test]
    fn non_positive_pages_are_rejected() {
        assert_eq!(
            Err(QueryValidationError::NonPositivePage(0)),
            PageRequest::new(Some(0), None)
        );
        assert_eq!(
            Err(QueryValidationError::NonPositivePageSize(-1)),
            PageRequest::new(None, Some(-1))
        );
        assert_eq!(
            Err(QueryValidationError::PageSizeTooLarge {
                max: 100,
                requested: 101
            }),
            PageRequest::new(None, Some(101))
        );
    }

    #[test]
    fn huge_page_is_too_large_not_negative() {
        let error = PageRequest::new(Some(5_000_000_000), None).unwrap_err();

        assert_eq!(
            QueryValidationError::PageTooLarge {
                max: u32::MAX,
                requested: 5_000_000_000
            },
            error
        );
        assert_eq!(
            "page may not be larger than 4294967295, got 5000000000",
            error.to_string()
        );
    }
}
