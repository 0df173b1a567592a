//! HTTP handler functions for the crimes-france API.

use actix_web::{HttpResponse, web};
use crimes_france_analytics::AnalyticsError;
use crimes_france_analytics_models::{RankBy, RankingScope, Scope, TopNParams};
use crimes_france_crime_models::OffenseClass;
use crimes_france_server_models::{
    ApiCommune, ApiError, ApiHealth, ApiOffenseClass, CommuneSearchParams, MapParams,
    RankingParams, ScopeParams, YearScopeParams,
};
use serde::Serialize;

use crate::AppState;

const DEFAULT_TOP_N: usize = 10;
const DEFAULT_SEARCH_LIMIT: usize = 20;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let store = state.analytics.store();
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        dataset_loaded: store.cached_snapshot().is_some(),
    })
}

/// `GET /api/classes`
///
/// Returns the offense class taxonomy.
pub async fn classes() -> HttpResponse {
    let classes: Vec<ApiOffenseClass> = OffenseClass::all()
        .iter()
        .copied()
        .map(ApiOffenseClass::from)
        .collect();
    HttpResponse::Ok().json(classes)
}

/// `GET /api/series`
///
/// Offenses, population and rates by year.
pub async fn series(state: web::Data<AppState>, params: web::Query<ScopeParams>) -> HttpResponse {
    let scope = match parse_scope(params.scope.as_deref()) {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    respond(state.analytics.year_series(&scope).await, "build year series")
}

/// `GET /api/categories`
///
/// Category totals for one year, largest first.
pub async fn categories(
    state: web::Data<AppState>,
    params: web::Query<YearScopeParams>,
) -> HttpResponse {
    let scope = match parse_scope(params.scope.as_deref()) {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    respond(
        state.analytics.categories(params.year, &scope).await,
        "aggregate categories",
    )
}

/// `GET /api/proportions`
///
/// Category shares for one year. Categories overlap, so shares describe
/// recorded class totals rather than distinct incidents.
pub async fn proportions(
    state: web::Data<AppState>,
    params: web::Query<YearScopeParams>,
) -> HttpResponse {
    let scope = match parse_scope(params.scope.as_deref()) {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    respond(
        state.analytics.proportions(params.year, &scope).await,
        "compute proportions",
    )
}

/// `GET /api/category-series`
///
/// Category totals for every year.
pub async fn category_series(
    state: web::Data<AppState>,
    params: web::Query<ScopeParams>,
) -> HttpResponse {
    let scope = match parse_scope(params.scope.as_deref()) {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    respond(
        state.analytics.category_series(&scope).await,
        "build category series",
    )
}

/// `GET /api/ranking`
///
/// Top-N communes or departments for one year and category.
pub async fn ranking(
    state: web::Data<AppState>,
    params: web::Query<RankingParams>,
) -> HttpResponse {
    let scope = match params.scope.as_deref() {
        None => RankingScope::Communes,
        Some(raw) => match raw.parse::<RankingScope>() {
            Ok(scope) => scope,
            Err(e) => return bad_request(&e.to_string()),
        },
    };
    let rank_by = match params.rank_by.as_deref() {
        None => RankBy::default(),
        Some(raw) => match raw.parse::<RankBy>() {
            Ok(rank_by) => rank_by,
            Err(_) => {
                return bad_request(&format!(
                    "invalid rankBy {raw:?}, expected raw_count or per_capita_rate"
                ));
            }
        },
    };

    let query = TopNParams {
        year: params.year,
        category: params.category.clone(),
        scope,
        n: params.n.unwrap_or(DEFAULT_TOP_N),
        rank_by,
    };
    respond(state.analytics.top_n(&query).await, "rank units")
}

/// `GET /api/departments/map`
///
/// Per-department totals with centroids.
pub async fn department_map(
    state: web::Data<AppState>,
    params: web::Query<MapParams>,
) -> HttpResponse {
    respond(
        state.analytics.department_map(params.year).await,
        "build department map",
    )
}

/// `GET /api/communes`
///
/// Searches communes by name, label or code.
pub async fn communes(
    state: web::Data<AppState>,
    params: web::Query<CommuneSearchParams>,
) -> HttpResponse {
    let query = params.q.as_deref().unwrap_or_default();
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let result = state
        .analytics
        .search_communes(query, limit)
        .await
        .map(|found| found.into_iter().map(ApiCommune::from).collect::<Vec<_>>());
    respond(result, "search communes")
}

/// `GET /api/summary`
///
/// Row counts, years and category frequencies of every table.
pub async fn summary(state: web::Data<AppState>) -> HttpResponse {
    respond(state.analytics.summary().await, "summarize dataset")
}

fn parse_scope(raw: Option<&str>) -> Result<Scope, HttpResponse> {
    raw.map_or(Ok(Scope::National), |raw| {
        raw.parse::<Scope>().map_err(|e| bad_request(&e.to_string()))
    })
}

fn respond<T: Serialize>(result: Result<T, AnalyticsError>, action: &str) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(e) => error_response(&e, action),
    }
}

fn error_response(error: &AnalyticsError, action: &str) -> HttpResponse {
    match error {
        AnalyticsError::Dataset(e) => {
            log::error!("Failed to {action}: {e}");
            let mut response = if e.is_retryable() {
                HttpResponse::ServiceUnavailable()
            } else {
                HttpResponse::InternalServerError()
            };
            response.json(ApiError {
                error: "Crime statistics are temporarily unavailable, please try again later"
                    .to_string(),
                retryable: true,
            })
        }
        AnalyticsError::UnknownScope { .. } | AnalyticsError::InvalidParameter { .. } => {
            log::debug!("Rejected request to {action}: {error}");
            bad_request(&error.to_string())
        }
    }
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError {
        error: message.to_string(),
        retryable: false,
    })
}
