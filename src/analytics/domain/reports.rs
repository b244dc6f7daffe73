use super::{filters::PageRequest, transactions::Transaction};

/// The number of buckets in a price histogram.
pub const BUCKET_COUNT: usize = 10;

/// The width of every bounded histogram bucket.
const BUCKET_WIDTH: f64 = 100.0;

/// Sale totals for a set of transactions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatisticsResult {
    /// The sum of prices of all sold transactions.
    pub total_sale_amount: f64,
    pub sold_count: u64,
    pub not_sold_count: u64,
}

/// One price range of a histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramBucket {
    pub range_label: String,
    pub count: u64,
}

/// Counts of transactions in ten fixed price ranges.
///
/// The ranges are `0-100`, `101-200`, ..., `801-900` and `901-more`. A price on
/// a boundary belongs to the lower range, so 100 is in `0-100` and 200 is in
/// `101-200`. Fractional prices between labelled ranges, like 100.5, belong to
/// the upper range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceHistogram {
    counts: [u64; BUCKET_COUNT],
}

impl PriceHistogram {
    /// Find the bucket a price belongs to.
    ///
    /// Prices outside the valid range (negative or NaN) are placed in the
    /// first bucket so every transaction is counted exactly once.
    pub fn bucket_index(price: f64) -> usize {
        // A saturating float-to-int cast maps negative and NaN values to 0.
        let upper_bound = (price / BUCKET_WIDTH).ceil() as usize;

        upper_bound.saturating_sub(1).min(BUCKET_COUNT - 1)
    }

    pub fn record(&mut self, price: f64) {
        self.counts[Self::bucket_index(price)] += 1;
    }

    /// The buckets in ascending price order, including empty ones.
    pub fn buckets(&self) -> Vec<HistogramBucket> {
        self.counts
            .iter()
            .enumerate()
            .map(|(index, count)| HistogramBucket {
                range_label: bucket_label(index),
                count: *count,
            })
            .collect()
    }
}

impl FromIterator<f64> for PriceHistogram {
    fn from_iter<I: IntoIterator<Item = f64>>(prices: I) -> Self {
        let mut histogram = Self::default();
        for price in prices {
            histogram.record(price);
        }

        histogram
    }
}

fn bucket_label(index: usize) -> String {
    let width = BUCKET_WIDTH as usize;

    match index {
        0 => format!("0-{}", width),
        last if last == BUCKET_COUNT - 1 => format!("{}-more", last * width + 1),
        index => format!("{}-{}", index * width + 1, (index + 1) * width),
    }
}

/// The number of transactions in a single category.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// One page of a transaction listing.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    /// The number of transactions matching the listing's filter across all
    /// pages.
    pub total: u64,
    pub page: PageRequest,
}

/// Every analytical view of one month, computed together.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedResult {
    pub transactions: Vec<Transaction>,
    pub statistics: StatisticsResult,
    pub histogram: Vec<HistogramBucket>,
    pub categories: Vec<CategoryCount>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels() {
        let labels = PriceHistogram::default()
            .buckets()
            .into_iter()
            .map(|bucket| bucket.range_label)
            .collect::<Vec<_>>();

        assert_eq!(
            vec![
                "0-100", "101-200", "201-300", "301-400", "401-500", "501-600", "601-700",
                "701-800", "801-900", "901-more",
            ],
            labels
        );
    }

    #[test]
    fn boundaries_belong_to_lower_bucket() {
        assert_eq!(0, PriceHistogram::bucket_index(0.0));
        assert_eq!(0, PriceHistogram::bucket_index(100.0));
        assert_eq!(1, PriceHistogram::bucket_index(101.0));
        assert_eq!(1, PriceHistogram::bucket_index(200.0));
        assert_eq!(8, PriceHistogram::bucket_index(900.0));
        assert_eq!(9, PriceHistogram::bucket_index(901.0));
    }

    #[test]
    fn fractional_price_between_ranges_goes_up() {
        assert_eq!(1, PriceHistogram::bucket_index(100.5));
        assert_eq!(9, PriceHistogram::bucket_index(900.01));
    }

    #[test]
    fn large_prices_go_to_last_bucket() {
        assert_eq!(9, PriceHistogram::bucket_index(999_999.0));
        assert_eq!(9, PriceHistogram::bucket_index(f64::INFINITY));
    }

    #[test]
    fn invalid_prices_go_to_first_bucket() {
        assert_eq!(0, PriceHistogram::bucket_index(-5.0));
        assert_eq!(0, PriceHistogram::bucket_index(f64::NAN));
    }

    #[test]
    fn empty_histogram_has_ten_zero_buckets() {
        let buckets = PriceHistogram::default().buckets();

        assert_eq!(BUCKET_COUNT, buckets.len());
        assert!(buckets.iter().all(|bucket| bucket.count == 0));
    }

    #[test]
    fn every_price_is_counted_once() {
        let prices = vec![
            0.0, 9.85, 55.99, 100.0, 109.95, 168.0, 599.0, 695.0, 999.99, 114.0,
        ];

        let histogram = prices.iter().copied().collect::<PriceHistogram>();
        let buckets = histogram.buckets();

        assert_eq!(
            prices.len() as u64,
            buckets.iter().map(|bucket| bucket.count).sum::<u64>()
        );
        assert_eq!(4, buckets[0].count);
        assert_eq!(3, buckets[1].count);
        assert_eq!(1, buckets[5].count);
        assert_eq!(1, buckets[6].count);
        assert_eq!(1, buckets[9].count);
    }
}
