#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server binary for the French crime statistics.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    crimes_france_server::run_server().await
}
