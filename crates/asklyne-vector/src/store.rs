use anyhow::{bail, Result};
use arrow_array::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

use asklyne_core::traits::VectorStore;
use asklyne_core::types::{ScoredText, SearchFilter, VectorPoint};

use crate::schema::{points_to_record_batch, vector_dim};
use crate::table::{filter_predicate, open_db, similarity_at, string_column, table_exists};

/// Vector store over a LanceDB directory, one table per collection.
pub struct LanceVectorStore {
	db: Connection,
	// Serializes create-or-merge so two first writers cannot both create a table.
	write_lock: Mutex<()>,
}

impl LanceVectorStore {
	pub async fn open(path: &Path) -> Result<Self> {
		std::fs::create_dir_all(path)?;
		let db = open_db(path.to_string_lossy().as_ref()).await?;
		Ok(Self { db, write_lock: Mutex::new(()) })
	}

	pub async fn count(&self, collection: &str) -> Result<usize> {
		if !table_exists(&self.db, collection).await? { return Ok(0); }
		Ok(self.db.open_table(collection).execute().await?.count_rows(None).await?)
	}
}

/// Last occurrence of each id wins; the merge key must be unique within a batch.
fn dedup_by_id(points: Vec<VectorPoint>) -> Vec<VectorPoint> {
	let mut position: HashMap<String, usize> = HashMap::new();
	let mut out: Vec<VectorPoint> = Vec::with_capacity(points.len());
	for p in points {
		match position.get(&p.id) {
			Some(&i) => out[i] = p,
			None => { position.insert(p.id.clone(), out.len()); out.push(p); }
		}
	}
	out
}

#[async_trait]
impl VectorStore for LanceVectorStore {
	async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
		let points = dedup_by_id(points);
		let Some(dim) = points.first().map(|p| p.vector.len()) else { return Ok(()) };
		if dim == 0 { bail!("empty vectors for collection '{collection}'"); }
		if let Some(bad) = points.iter().find(|p| p.vector.len() != dim) {
			bail!("point {} has dimension {} but the batch uses {dim}", bad.id, bad.vector.len());
		}
		let batch = points_to_record_batch(&points, dim)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

		let _guard = self.write_lock.lock().await;
		if table_exists(&self.db, collection).await? {
			let t = self.db.open_table(collection).execute().await?;
			let existing = vector_dim(t.schema().await?.as_ref());
			if existing != Some(dim) {
				bail!("collection '{collection}' holds {existing:?}-dim vectors, got {dim}");
			}
			let mut mi = t.merge_insert(&["id"]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
		} else {
			self.db.create_table(collection, reader).execute().await?;
		}
		debug!(collection, points = points.len(), "upserted vectors");
		Ok(())
	}

	async fn search(&self, collection: &str, query_vector: &[f32], top_k: usize, filter: &SearchFilter) -> Result<Vec<ScoredText>> {
		if top_k == 0 || !table_exists(&self.db, collection).await? { return Ok(Vec::new()); }
		let table = self.db.open_table(collection).execute().await?;
		let mut stream = table
			.vector_search(query_vector.to_vec())?
			.distance_type(DistanceType::Cosine)
			.only_if(filter_predicate(filter))
			.limit(top_k)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let texts = string_column(&batch, "text")?;
			for i in 0..batch.num_rows() {
				hits.push(ScoredText { text: texts.value(i).to_string(), score: similarity_at(&batch, i) });
			}
		}
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(top_k);
		Ok(hits)
	}
}
