use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{debug, error};

use crate::{
    analytics::{domain::filters::ListQuery, services::AnalyticsService},
    http_err::ApiResponse,
    server::AppState,
};

use super::reps;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(get_transactions))
        .route("/statistics", get(get_statistics))
        .route("/bar-chart", get(get_price_ranges))
        .route("/bar-chart/:month", get(get_price_ranges_for_month))
        .route("/pie-chart", get(get_categories))
        .route("/pie-chart/:month", get(get_categories_for_month))
        .route("/combined", get(get_combined))
}

async fn get_transactions(
    State(analytics): State<AnalyticsService>,
    Query(params): Query<reps::ListParams>,
) -> ApiResponse<Json<reps::TransactionPage>> {
    let query = ListQuery::try_from(params)?;
    debug!(?query, "Listing transactions.");

    match analytics.list_transactions(query).await {
        Ok(page) => Ok(Json(page.into())),
        Err(error) => {
            error!(?error, "Failed to list transactions.");

            Err(error.into())
        }
    }
}

async fn get_statistics(
    State(analytics): State<AnalyticsService>,
    Query(params): Query<reps::MonthParams>,
) -> ApiResponse<Json<reps::Statistics>> {
    let month = params.sale_month()?;

    match analytics.statistics(month).await {
        Ok(statistics) => Ok(Json(statistics.into())),
        Err(error) => {
            error!(?error, ?month, "Failed to compute sale statistics.");

            Err(error.into())
        }
    }
}

async fn get_price_ranges(
    State(analytics): State<AnalyticsService>,
    Query(params): Query<reps::MonthParams>,
) -> ApiResponse<Json<Vec<reps::PriceRange>>> {
    price_ranges(&analytics, params.month.as_deref()).await
}

async fn get_price_ranges_for_month(
    State(analytics): State<AnalyticsService>,
    Path(month): Path<String>,
) -> ApiResponse<Json<Vec<reps::PriceRange>>> {
    price_ranges(&analytics, Some(&month)).await
}

async fn price_ranges(
    analytics: &AnalyticsService,
    month: Option<&str>,
) -> ApiResponse<Json<Vec<reps::PriceRange>>> {
    let month = reps::parse_sale_month(month)?;

    match analytics.price_histogram(month).await {
        Ok(buckets) => Ok(Json(buckets.into_iter().map(Into::into).collect())),
        Err(error) => {
            error!(?error, ?month, "Failed to compute price ranges.");

            Err(error.into())
        }
    }
}

async fn get_categories(
    State(analytics): State<AnalyticsService>,
    Query(params): Query<reps::MonthParams>,
) -> ApiResponse<Json<Vec<reps::CategoryCount>>> {
    categories(&analytics, params.month.as_deref()).await
}

async fn get_categories_for_month(
    State(analytics): State<AnalyticsService>,
    Path(month): Path<String>,
) -> ApiResponse<Json<Vec<reps::CategoryCount>>> {
    categories(&analytics, Some(&month)).await
}

async fn categories(
    analytics: &AnalyticsService,
    month: Option<&str>,
) -> ApiResponse<Json<Vec<reps::CategoryCount>>> {
    let month = reps::parse_sale_month(month)?;

    match analytics.category_distribution(month).await {
        Ok(categories) => Ok(Json(categories.into_iter().map(Into::into).collect())),
        Err(error) => {
            error!(?error, ?month, "Failed to compute category distribution.");

            Err(error.into())
        }
    }
}

async fn get_combined(
    State(analytics): State<AnalyticsService>,
    Query(params): Query<reps::MonthParams>,
) -> ApiResponse<Json<reps::Combined>> {
    let month = params.sale_month()?;

    match analytics.combined(month).await {
        Ok(combined) => Ok(Json(combined.into())),
        Err(error) => {
            error!(?error, ?month, "Failed to compute combined report.");

            Err(error.into())
        }
    }
}
