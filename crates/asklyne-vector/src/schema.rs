use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use asklyne_core::types::VectorPoint;

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("session_id", DataType::Utf8, false),
		Field::new("tier", DataType::Utf8, false),
		Field::new("mode", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}

pub fn points_to_record_batch(points: &[VectorPoint], dim: usize) -> anyhow::Result<RecordBatch> {
	let width = i32::try_from(dim)?;
	let schema = build_arrow_schema(width);
	let mut ids = Vec::with_capacity(points.len()); let mut sessions = Vec::with_capacity(points.len()); let mut tiers = Vec::with_capacity(points.len());
	let mut modes = Vec::with_capacity(points.len()); let mut texts = Vec::with_capacity(points.len()); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(points.len());
	for p in points {
		ids.push(p.id.clone()); sessions.push(p.payload.session_id.clone()); tiers.push(p.payload.tier.as_str()); modes.push(p.payload.mode.as_str()); texts.push(p.payload.text.clone());
		vectors.push(Some(p.vector.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(sessions)),
		Arc::new(StringArray::from(tiers)),
		Arc::new(StringArray::from(modes)),
		Arc::new(StringArray::from(texts)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), width)),
	])?;
	Ok(record_batch)
}
