//! LanceDB connection helpers and predicate building.

use anyhow::Result;
use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use lancedb::{connect, Connection};

use asklyne_core::types::SearchFilter;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

fn quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

/// SQL predicate equivalent to `SearchFilter::matches`.
pub fn filter_predicate(filter: &SearchFilter) -> String {
	format!("session_id = {} AND mode = {}", quote(&filter.session_id), quote(filter.mode.as_str()))
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow::anyhow!("column '{name}' missing or not utf8"))
}

/// Similarity per row: `1 - _distance` when the engine reports a distance.
pub fn similarity_at(batch: &RecordBatch, row: usize) -> f32 {
	match batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()) {
		Some(d) if !d.is_null(row) => 1.0 - d.value(row),
		_ => 0.0,
	}
}
