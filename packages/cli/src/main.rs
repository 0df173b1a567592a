#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the French crime statistics.
//!
//! Every subcommand prints an aligned text table, or JSON with `--json`.
//! Tables are downloaded on each run unless `CRIMES_FRANCE_DATA_DIR` points
//! at local copies.

mod render;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use crimes_france_analytics::Analytics;
use crimes_france_analytics_models::{RankBy, RankingScope, Scope, TopNParams};
use crimes_france_crime_models::OffenseClass;
use crimes_france_dataset::{DatasetError, DatasetStore};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "crimes_france",
    about = "French municipal and departmental crime statistics"
)]
struct Cli {
    /// Print JSON instead of a text table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Offenses, population and rate per year
    Series {
        /// `national`, `department:<code>` or `commune:<code>`
        #[arg(long, default_value = "national")]
        scope: Scope,
        /// Show totals per category and year instead
        #[arg(long)]
        by_category: bool,
    },
    /// Offense totals per category for one year, largest first
    Categories {
        /// Four-digit year
        #[arg(long)]
        year: i32,
        /// `national`, `department:<code>` or `commune:<code>`
        #[arg(long, default_value = "national")]
        scope: Scope,
    },
    /// Share of each category in the sum of category totals for one year
    Proportions {
        /// Four-digit year
        #[arg(long)]
        year: i32,
        /// `national`, `department:<code>` or `commune:<code>`
        #[arg(long, default_value = "national")]
        scope: Scope,
    },
    /// Top communes or departments for one year and category
    Top {
        /// Four-digit year
        #[arg(long)]
        year: i32,
        /// Category label, e.g. "Cambriolages de logement"
        #[arg(long)]
        category: String,
        /// `communes`, `communes:<department code>` or `departments`
        #[arg(long, default_value = "communes")]
        scope: RankingScope,
        /// Number of units to show
        #[arg(short, long, default_value = "10")]
        n: usize,
        /// `raw_count` or `per_capita_rate`
        #[arg(long, default_value = "raw_count")]
        rank_by: RankBy,
    },
    /// Per-department totals with centroid coordinates
    Map {
        /// Four-digit year
        #[arg(long)]
        year: i32,
    },
    /// Search communes by name or code
    Communes {
        /// Search text
        query: String,
        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Row counts, years and category frequencies of every table
    Summary,
    /// List the offense classes
    Classes,
}

fn print<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> Result<String, std::fmt::Error>,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value)?);
    }
    Ok(())
}

fn analytics() -> Result<Analytics, DatasetError> {
    log::debug!("Building dataset store from the environment");
    Ok(Analytics::new(Arc::new(DatasetStore::from_env()?)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Commands::Series { scope, by_category } => {
            let analytics = analytics()?;
            if by_category {
                let entries = analytics.category_series(&scope).await?;
                print(json, &entries, |e| render::category_series(e))?;
            } else {
                let entries = analytics.year_series(&scope).await?;
                print(json, &entries, |e| render::series(e))?;
            }
        }
        Commands::Categories { year, scope } => {
            let aggregates = analytics()?.categories(year, &scope).await?;
            print(json, &aggregates, |a| render::categories(a))?;
        }
        Commands::Proportions { year, scope } => {
            let shares = analytics()?.proportions(year, &scope).await?;
            print(json, &shares, |s| render::proportions(s))?;
        }
        Commands::Top {
            year,
            category,
            scope,
            n,
            rank_by,
        } => {
            let units = analytics()?
                .top_n(&TopNParams {
                    year,
                    category,
                    scope,
                    n,
                    rank_by,
                })
                .await?;
            if units.is_empty() && !json {
                println!("No matching offenses.");
            } else {
                print(json, &units, |u| render::ranking(u))?;
            }
        }
        Commands::Map { year } => {
            let points = analytics()?.department_map(year).await?;
            print(json, &points, |p| render::map(p))?;
        }
        Commands::Communes { query, limit } => {
            let found = analytics()?.search_communes(&query, limit).await?;
            print(json, &found, |f| render::communes(f))?;
        }
        Commands::Summary => {
            let summary = analytics()?.summary().await?;
            print(json, &summary, render::summary)?;
        }
        Commands::Classes => {
            let classes: Vec<&str> = OffenseClass::all().iter().map(|c| c.label()).collect();
            print(json, &classes, |_| render::classes())?;
        }
    }

    Ok(())
}
