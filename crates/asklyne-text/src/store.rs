use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use asklyne_core::traits::KeywordStore;
use asklyne_core::types::{KeywordDocument, ScoredText, SearchFilter};

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

struct CollectionIndex {
	index: Index,
	reader: IndexReader,
	// Created on first write: the writer holds the directory's exclusive lock,
	// so read-only handles must never open one.
	writer: Mutex<Option<IndexWriter>>,
	fields: ChunkFields,
}

impl CollectionIndex {
	fn open(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = ChunkFields::resolve(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, writer: Mutex::new(None), fields })
	}

	/// Replace-by-id, then commit and refresh the reader so the batch is searchable on return.
	fn upsert(&self, documents: &[KeywordDocument]) -> Result<()> {
		let mut guard = self.writer.lock();
		if guard.is_none() {
			*guard = Some(self.index.writer(WRITER_MEMORY_BYTES)?);
		}
		let Some(writer) = guard.as_mut() else { bail!("keyword index writer unavailable") };
		for d in documents {
			writer.delete_term(Term::from_field_text(self.fields.id, &d.id));
			writer.add_document(doc!(
				self.fields.id => d.id.clone(),
				self.fields.session_id => d.payload.session_id.clone(),
				self.fields.tier => d.payload.tier.as_str().to_string(),
				self.fields.mode => d.payload.mode.as_str().to_string(),
				self.fields.text => d.payload.text.clone(),
			))?;
		}
		writer.commit()?;
		self.reader.reload()?;
		Ok(())
	}

	fn search(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Result<Vec<ScoredText>> {
		// Picks up commits made by other handles on the same directory.
		self.reader.reload()?;
		let searcher = self.reader.searcher();
		let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
		let (text_query, errors) = parser.parse_query_lenient(query);
		if !errors.is_empty() { debug!(errors = errors.len(), "lenient query parse dropped terms"); }
		let must_term = |field, value: &str| -> (Occur, Box<dyn Query>) {
			(Occur::Must, Box::new(TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic)))
		};
		let q = BooleanQuery::new(vec![
			(Occur::Must, text_query),
			must_term(self.fields.session_id, &filter.session_id),
			must_term(self.fields.mode, filter.mode.as_str()),
		]);
		let top_docs = searcher.search(&q, &TopDocs::with_limit(top_k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(text) = doc.get_first(self.fields.text).and_then(|v| v.as_str()) else { continue };
			hits.push(ScoredText { text: text.to_string(), score });
		}
		Ok(hits)
	}
}

/// Keyword store over one tantivy index per collection.
///
/// Directory-backed stores keep each collection under `<root>/<collection>`;
/// in-memory stores lose everything on drop. Any number of handles may search
/// the same directory; only one may write at a time.
pub struct TantivyKeywordStore {
	collections: Arc<Collections>,
}

struct Collections {
	root: Option<PathBuf>,
	open: Mutex<HashMap<String, Arc<CollectionIndex>>>,
}

impl Collections {
	/// Blocking: may create directories and open index files. The map lock is
	/// not held while the index opens.
	fn get(&self, name: &str, create: bool) -> Result<Option<Arc<CollectionIndex>>> {
		if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
			bail!("invalid collection name '{name}'");
		}
		if let Some(existing) = self.open.lock().get(name) {
			return Ok(Some(Arc::clone(existing)));
		}
		let index = match &self.root {
			Some(root) => {
				let dir = root.join(name);
				if !dir.exists() && !create { return Ok(None); }
				std::fs::create_dir_all(&dir)?;
				Index::open_or_create(MmapDirectory::open(&dir)?, build_schema())?
			}
			None if create => Index::create_in_ram(build_schema()),
			None => return Ok(None),
		};
		let opened = Arc::new(CollectionIndex::open(index)?);
		let mut open = self.open.lock();
		// A concurrent caller may have won the race; keep its handle.
		let entry = open.entry(name.to_string()).or_insert_with(|| {
			debug!(collection = name, "opened keyword index");
			opened
		});
		Ok(Some(Arc::clone(entry)))
	}
}

impl TantivyKeywordStore {
	pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
		let root = root.into();
		std::fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
		Ok(Self::with_root(Some(root)))
	}

	pub fn in_memory() -> Self {
		Self::with_root(None)
	}

	fn with_root(root: Option<PathBuf>) -> Self {
		Self { collections: Arc::new(Collections { root, open: Mutex::new(HashMap::new()) }) }
	}
}

#[async_trait]
impl KeywordStore for TantivyKeywordStore {
	async fn upsert(&self, collection: &str, documents: Vec<KeywordDocument>) -> Result<()> {
		if documents.is_empty() { return Ok(()); }
		let collections = Arc::clone(&self.collections);
		let name = collection.to_string();
		tokio::task::spawn_blocking(move || {
			let Some(index) = collections.get(&name, true)? else { bail!("collection '{name}' unavailable") };
			index.upsert(&documents)
		})
		.await?
	}

	async fn search(&self, collection: &str, query: &str, top_k: usize, filter: &SearchFilter) -> Result<Vec<ScoredText>> {
		if top_k == 0 || query.trim().is_empty() { return Ok(Vec::new()); }
		let collections = Arc::clone(&self.collections);
		let (name, query, filter) = (collection.to_string(), query.to_string(), filter.clone());
		tokio::task::spawn_blocking(move || match collections.get(&name, false)? {
			Some(index) => index.search(&query, top_k, &filter),
			None => Ok(Vec::new()),
		})
		.await?
	}
}
