//! Plain-text tables for terminal output.

use std::fmt::{self, Display, Write as _};

use crimes_france_analytics_models::{
    CategoryAggregate, CategoryShare, CategoryYearEntry, DatasetSummary, DepartmentPoint,
    PopulationSource, RankedUnit, YearSeriesEntry,
};
use crimes_france_crime_models::{OffenseClass, REFERENCE_CLASS};
use crimes_france_geography_models::GeographyMetadata;

fn or_dash<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn rule(out: &mut String, width: usize) -> fmt::Result {
    writeln!(out, "{}", "-".repeat(width))
}

pub fn series(entries: &[YearSeriesEntry]) -> Result<String, fmt::Error> {
    let backfilled = |e: &YearSeriesEntry| {
        matches!(
            e.population_source,
            Some(PopulationSource::Reference | PopulationSource::CarriedForward)
        )
    };

    let mut out = String::new();
    writeln!(
        out,
        "{:<6} {:>10} {:>12} {:>10} {:>9}",
        "YEAR", "OFFENSES", "POPULATION", "PER 1000", "CHANGE %"
    )?;
    rule(&mut out, 51)?;
    for e in entries {
        let population = match e.population {
            Some(p) if backfilled(e) => format!("{p}*"),
            other => or_dash(other),
        };
        writeln!(
            out,
            "{:<6} {:>10} {:>12} {:>10} {:>9}",
            e.year,
            e.total_offenses,
            population,
            or_dash(e.offenses_per_1000),
            or_dash(e.relative_change_pct),
        )?;
    }
    if entries.iter().any(backfilled) {
        writeln!(out, "* population not published for that year, backfilled")?;
    }
    Ok(out)
}

pub fn categories(aggregates: &[CategoryAggregate]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{:>10}  CATEGORY", "OFFENSES")?;
    rule(&mut out, 60)?;
    for a in aggregates {
        writeln!(out, "{:>10}  {}", a.total_offenses, a.category)?;
    }
    Ok(out)
}

pub fn proportions(shares: &[CategoryShare]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{:>8} {:>10}  CATEGORY", "SHARE %", "OFFENSES")?;
    rule(&mut out, 60)?;
    for s in shares {
        writeln!(
            out,
            "{:>8.2} {:>10}  {}",
            s.share_pct, s.total_offenses, s.category
        )?;
    }
    writeln!(
        out,
        "Classes overlap: shares are of recorded class totals, not of incidents."
    )?;
    Ok(out)
}

pub fn category_series(entries: &[CategoryYearEntry]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{:<6} {:>10}  CATEGORY", "YEAR", "OFFENSES")?;
    rule(&mut out, 60)?;
    for e in entries {
        writeln!(out, "{:<6} {:>10}  {}", e.year, e.total_offenses, e.category)?;
    }
    Ok(out)
}

pub fn ranking(units: &[RankedUnit]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "{:>4}  {:<32} {:>10} {:>12} {:>12}  DEPARTMENT",
        "#", "NAME", "OFFENSES", "POPULATION", "PER 1000"
    )?;
    rule(&mut out, 100)?;
    for (rank, u) in units.iter().enumerate() {
        writeln!(
            out,
            "{:>4}  {:<32} {:>10} {:>12} {:>12}  {} ({})",
            rank + 1,
            u.geography_name,
            u.offense_count,
            or_dash(u.population),
            or_dash(u.rate_per_capita.map(|r| format!("{:.2}", r * 1000.0))),
            u.department_name,
            u.department_code,
        )?;
    }
    Ok(out)
}

pub fn map(points: &[DepartmentPoint]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "{:<4} {:<28} {:>10} {:>12} {:>10} {:>9} {:>9}",
        "DEP", "NAME", "OFFENSES", "POPULATION", "PER 1000", "LAT", "LON"
    )?;
    rule(&mut out, 88)?;
    for p in points {
        writeln!(
            out,
            "{:<4} {:<28} {:>10} {:>12} {:>10} {:>9.4} {:>9.4}",
            p.department_code,
            p.department_name,
            p.total_offenses,
            or_dash(p.population),
            or_dash(p.offenses_per_inhabitant.map(|r| format!("{:.2}", r * 1000.0))),
            p.lat,
            p.lon,
        )?;
    }
    Ok(out)
}

pub fn communes(found: &[GeographyMetadata]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{:<6} {:<40} DEPARTMENT", "CODE", "COMMUNE")?;
    rule(&mut out, 72)?;
    for c in found {
        writeln!(
            out,
            "{:<6} {:<40} {}",
            c.geography_code,
            c.label(),
            c.department_name
        )?;
    }
    Ok(out)
}

pub fn summary(summary: &DatasetSummary) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for table in &summary.tables {
        writeln!(
            out,
            "{}: {} rows, {} dropped",
            table.table, table.rows, table.dropped_rows
        )?;
        if let (Some(first), Some(last)) = (table.years.first(), table.years.last()) {
            writeln!(out, "  years: {first}-{last} ({} distinct)", table.years.len())?;
        }
        for count in &table.category_counts {
            writeln!(out, "  {:>8}  {}", count.rows, count.category)?;
        }
    }
    Ok(out)
}

pub fn classes() -> Result<String, fmt::Error> {
    let mut out = String::new();
    for class in OffenseClass::all() {
        let marker = if *class == REFERENCE_CLASS { "*" } else { " " };
        writeln!(
            out,
            "{marker} {:<56} {}",
            class.label(),
            class.english_label()
        )?;
    }
    writeln!(out, "* population reference class")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_marks_backfilled_population() {
        let text = series(&[
            YearSeriesEntry {
                year: 2020,
                total_offenses: 10,
                population: Some(1_000),
                population_source: Some(PopulationSource::Recorded),
                offenses_per_1000: Some(10.0),
                relative_change_pct: None,
            },
            YearSeriesEntry {
                year: 2021,
                total_offenses: 12,
                population: Some(1_000),
                population_source: Some(PopulationSource::CarriedForward),
                offenses_per_1000: Some(12.0),
                relative_change_pct: Some(20.0),
            },
        ])
        .unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].starts_with("2020"));
        assert!(lines[2].trim_end().ends_with('-'));
        assert!(lines[3].contains("1000*"));
        assert!(lines.last().unwrap().starts_with('*'));
    }

    #[test]
    fn ranking_shows_missing_rates_as_dashes() {
        let text = ranking(&[RankedUnit {
            geography_code: "13022".to_string(),
            geography_name: "Cassis".to_string(),
            offense_count: 7,
            rate_per_capita: None,
            population: None,
            department_code: "13".to_string(),
            department_name: "Bouches-du-Rhône".to_string(),
        }])
        .unwrap();
        let row = text.lines().nth(2).unwrap();
        assert!(row.contains("Cassis"));
        assert!(row.contains("Bouches-du-Rhône (13)"));
        assert_eq!(row.split_whitespace().filter(|w| *w == "-").count(), 2);
    }

    #[test]
    fn classes_flag_the_reference() {
        let text = classes().unwrap();
        let flagged: Vec<&str> = text.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(flagged.len(), 2);
        assert!(flagged[0].contains("Coups et blessures volontaires"));
    }
}
