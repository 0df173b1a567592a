#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the French crime statistics.
//!
//! Serves year series, category aggregates, rankings and the department
//! map as JSON under `/api`. The three source tables are loaded on the
//! first request (or by the warm-up task at start-up) and shared by every
//! worker afterwards.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use crimes_france_analytics::Analytics;
use crimes_france_dataset::DatasetStore;

/// Shared application state.
pub struct AppState {
    /// Aggregations over the shared dataset store.
    pub analytics: Analytics,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/classes", web::get().to(handlers::classes))
            .route("/series", web::get().to(handlers::series))
            .route("/categories", web::get().to(handlers::categories))
            .route("/proportions", web::get().to(handlers::proportions))
            .route("/category-series", web::get().to(handlers::category_series))
            .route("/ranking", web::get().to(handlers::ranking))
            .route("/departments/map", web::get().to(handlers::department_map))
            .route("/communes", web::get().to(handlers::communes))
            .route("/summary", web::get().to(handlers::summary)),
    );
}

/// Starts the crimes-france API server.
///
/// Builds the dataset store from the environment, starts loading the
/// tables in the background and serves the API on `BIND_ADDR:PORT`
/// (default `127.0.0.1:8080`). This is a regular async function; the
/// caller provides the runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the source configuration cannot be loaded.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Loading source configuration...");
    let store = DatasetStore::from_env().expect("Failed to load source configuration");
    let analytics = Analytics::new(Arc::new(store));

    let warm_up = analytics.clone();
    actix_rt::spawn(async move {
        match warm_up.snapshot().await {
            Ok(snapshot) => log::info!(
                "Dataset ready: {} commune rows, {} department rows, {} communes",
                snapshot.main().len(),
                snapshot.department().len(),
                snapshot.geography().len()
            ),
            Err(e) => log::warn!("Dataset warm-up failed, will retry on first request: {e}"),
        }
    });

    let state = web::Data::new(AppState { analytics });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use actix_web::{http::StatusCode, test};
    use async_trait::async_trait;
    use crimes_france_analytics_models::{CategoryShare, RankedUnit, YearSeriesEntry};
    use crimes_france_server_models::{ApiCommune, ApiError, ApiHealth};
    use crimes_france_source::{Fetcher, SourceError, config::SourcesConfig};

    use super::*;

    const CONFIG: &str = r#"
        [tables.main]
        url = "main"
        format = "csv"
        [tables.department]
        url = "department"
        format = "csv"
        [tables.commune_metadata]
        url = "metadata"
        format = "csv"
        delimiter = ","
    "#;

    const MAIN_CSV: &str = "\
CODGEO_2023;annee;classe;faits;POP
13022;21;Coups et blessures volontaires;10;7500
13022;22;Coups et blessures volontaires;12;7500
13022;22;Vols avec armes;4;7500
75056;22;Coups et blessures volontaires;9000;2100000
";

    const DEPARTMENT_CSV: &str = "\
Code.département;annee;classe;faits;POP
13;22;Coups et blessures volontaires;16000;2043110
75;22;Coups et blessures volontaires;15000;2145906
";

    const METADATA_CSV: &str = "\
CODGEO,LIBGEO,DEP
13022,Cassis,13
75056,Paris,75
";

    #[derive(Default)]
    struct StaticFetcher {
        unavailable: AtomicBool,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(SourceError::Status {
                    status: 502,
                    url: location.to_string(),
                });
            }
            let body = match location {
                "main" => MAIN_CSV,
                "department" => DEPARTMENT_CSV,
                _ => METADATA_CSV,
            };
            Ok(body.as_bytes().to_vec())
        }
    }

    fn state(fetcher: Arc<StaticFetcher>) -> web::Data<AppState> {
        let config = SourcesConfig::from_toml(CONFIG).unwrap();
        web::Data::new(AppState {
            analytics: Analytics::new(Arc::new(DatasetStore::new(fetcher, config))),
        })
    }

    #[actix_web::test]
    async fn serves_series_and_rankings() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(StaticFetcher::default())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/series?scope=commune:13022")
            .to_request();
        let series: Vec<YearSeriesEntry> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].total_offenses, 16);

        let req = test::TestRequest::get()
            .uri("/api/ranking?year=2022&category=Coups%20et%20blessures%20volontaires&rankBy=per_capita_rate")
            .to_request();
        let ranking: Vec<RankedUnit> = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = ranking.iter().map(|u| u.geography_name.as_str()).collect();
        assert_eq!(names, vec!["Paris", "Cassis"]);

        let req = test::TestRequest::get()
            .uri("/api/proportions?year=2022&scope=commune:13022")
            .to_request();
        let shares: Vec<CategoryShare> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(shares[0].share_pct, 75.0);

        let req = test::TestRequest::get().uri("/api/communes?q=pari").to_request();
        let communes: Vec<ApiCommune> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(communes[0].label, "Paris (75)");

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let health: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(health.dataset_loaded);
    }

    #[actix_web::test]
    async fn rejects_malformed_parameters() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(StaticFetcher::default())))
                .configure(configure),
        )
        .await;

        for uri in [
            "/api/series?scope=region:11",
            "/api/series?scope=commune:01001",
            "/api/ranking?year=2022&category=x&rankBy=loudest",
            "/api/ranking?year=2022&category=%20",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: ApiError = test::read_body_json(resp).await;
            assert!(!body.retryable);
        }
    }

    #[actix_web::test]
    async fn unavailable_source_is_a_retryable_503() {
        let fetcher = Arc::new(StaticFetcher::default());
        fetcher.unavailable.store(true, Ordering::SeqCst);
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::clone(&fetcher)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/summary").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ApiError = test::read_body_json(resp).await;
        assert!(body.retryable);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let health: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(!health.dataset_loaded);

        fetcher.unavailable.store(false, Ordering::SeqCst);
        let req = test::TestRequest::get().uri("/api/summary").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
