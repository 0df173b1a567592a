//! Row counts, years and category frequencies of each table.

use std::collections::HashMap;

use crimes_france_analytics_models::{CategoryRowCount, DatasetSummary, TableSummary};
use crimes_france_dataset::Snapshot;
use crimes_france_source_models::TableId;

/// Summarizes every table of `snapshot`.
#[must_use]
pub fn summarize(snapshot: &Snapshot) -> DatasetSummary {
    DatasetSummary {
        tables: TableId::all()
            .iter()
            .map(|&table| summarize_table(snapshot, table))
            .collect(),
    }
}

fn summarize_table(snapshot: &Snapshot, table: TableId) -> TableSummary {
    let dropped_rows = snapshot.report(table).map_or(0, |r| r.dropped_count());

    if table == TableId::CommuneMetadata {
        return TableSummary {
            table,
            rows: snapshot.geography().len(),
            dropped_rows,
            years: Vec::new(),
            category_counts: Vec::new(),
        };
    }

    let records = snapshot.records(table);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in records {
        *counts.entry(row.category.as_str()).or_insert(0) += 1;
    }
    let mut category_counts: Vec<CategoryRowCount> = counts
        .into_iter()
        .map(|(category, rows)| CategoryRowCount {
            category: category.to_string(),
            rows,
        })
        .collect();
    category_counts.sort_by(|a, b| b.rows.cmp(&a.rows).then_with(|| a.category.cmp(&b.category)));

    TableSummary {
        table,
        rows: records.len(),
        dropped_rows,
        years: snapshot.years(table).into_iter().collect(),
        category_counts,
    }
}
