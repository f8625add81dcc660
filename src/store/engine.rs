use bson::{Bson, Document};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::collection::{Collection, doc_id};
use super::pipeline;
use super::predicate::Predicate;
use super::wal::{Wal, WalOp, WalRecord};
use crate::context::CallContext;
use crate::errors::StoreError;
use crate::logger::AUDIT_TARGET;

/// Store configuration. Without a path the store is purely in memory.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: Option<PathBuf>,
    pub name: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { path: None, name: "resik".to_string() }
    }
}

/// Embedded document store: named collections, aggregation pipelines, and an optional
/// write-ahead log replayed on open.
pub struct Store {
    options: StoreOptions,
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
    wal: Option<Mutex<Wal>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("options", &self.options).finish_non_exhaustive()
    }
}

impl Store {
    #[must_use]
    pub fn in_memory() -> Self {
        Self { options: StoreOptions::default(), collections: RwLock::new(HashMap::new()), wal: None }
    }

    /// Opens the store, replaying `<path>/<name>.wal` when a path is configured.
    ///
    /// # Errors
    /// I/O failures or a corrupt log.
    pub fn open(options: StoreOptions) -> Result<Self, StoreError> {
        let Some(dir) = options.path.clone() else {
            return Ok(Self { options, ..Self::in_memory() });
        };
        let wal_path = dir.join(format!("{}.wal", options.name));
        let (wal, records) = Wal::open(&wal_path)?;
        let store = Self { options, collections: RwLock::new(HashMap::new()), wal: None };
        let replayed = records.len();
        for rec in records {
            store.apply_record(rec)?;
        }
        log::info!("store opened at {} ({replayed} log records)", wal.path().display());
        Ok(Self { wal: Some(Mutex::new(wal)), ..store })
    }

    fn apply_record(&self, rec: WalRecord) -> Result<(), StoreError> {
        let col = self.collection(&rec.collection);
        let mut col = col.write();
        match (rec.op, rec.body) {
            (WalOp::Insert, Some(body)) => {
                let doc = decode_body(&body)?;
                // a replayed insert over an existing id behaves like a replace
                if col.replace(&rec.id, doc.clone()).is_none() {
                    col.insert(doc)?;
                }
            }
            (WalOp::Replace, Some(body)) => {
                col.replace(&rec.id, decode_body(&body)?);
            }
            (WalOp::Delete, _) => {
                col.remove(&rec.id);
            }
            (op, None) => {
                return Err(StoreError::InvalidDocument(format!("{op:?} record for {} has no body", rec.id)));
            }
        }
        Ok(())
    }

    fn collection(&self, name: &str) -> Arc<RwLock<Collection>> {
        if let Some(c) = self.collections.read().get(name) {
            return Arc::clone(c);
        }
        Arc::clone(self.collections.write().entry(name.to_string()).or_default())
    }

    /// Durably records a mutation before it is applied in memory.
    fn log(&self, op: WalOp, collection: &str, id: &str, doc: Option<&Document>) -> Result<(), StoreError> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };
        let body = doc.map(encode_body).transpose()?;
        let rec = WalRecord {
            op,
            collection: collection.to_string(),
            id: id.to_string(),
            body,
            ts_millis: chrono::Utc::now().timestamp_millis(),
        };
        wal.lock().append(&rec)
    }

    /// # Errors
    /// `DuplicateKey`, `InvalidDocument`, context failures, or log I/O.
    pub fn insert_one(&self, ctx: &CallContext, collection: &str, doc: Document) -> Result<(), StoreError> {
        ctx.check()?;
        let id = doc_id(&doc)?.to_string();
        let col = self.collection(collection);
        let mut col = col.write();
        if col.contains(&id) {
            return Err(StoreError::DuplicateKey(id));
        }
        self.log(WalOp::Insert, collection, &id, Some(&doc))?;
        col.insert(doc)?;
        log::info!(target: AUDIT_TARGET, "insert collection={collection} id={id}");
        Ok(())
    }

    /// First document in insertion order matching `filter`.
    ///
    /// # Errors
    /// `QueryError` for a malformed filter, or context failures.
    pub fn find_one(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let pred = Predicate::parse(filter)?;
        let col = self.collection(collection);
        let col = col.read();
        Ok(find_in(ctx, &col, &pred)?.and_then(|id| col.get(&id).cloned()))
    }

    /// # Errors
    /// `QueryError` for a malformed filter, or context failures.
    pub fn count_documents(&self, ctx: &CallContext, collection: &str, filter: &Document) -> Result<i64, StoreError> {
        ctx.check()?;
        let pred = Predicate::parse(filter)?;
        let col = self.collection(collection);
        let col = col.read();
        let mut n = 0i64;
        for doc in col.iter() {
            ctx.check()?;
            if pred.matches(doc) {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Runs `$match`/`$sort`/`$skip`/`$limit` stages over the collection.
    ///
    /// # Errors
    /// `QueryError` for unsupported stages, or context failures.
    pub fn aggregate(
        &self,
        ctx: &CallContext,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, StoreError> {
        ctx.check()?;
        let stages = pipeline::compile(pipeline)?;
        let started = Instant::now();
        let col = self.collection(collection);
        let col = col.read();
        let out = pipeline::run(ctx, col.iter(), &stages)?;
        log::debug!(
            "aggregate collection={collection} stages={} scanned={} returned={} elapsed_ms={}",
            stages.len(),
            col.len(),
            out.len(),
            started.elapsed().as_millis()
        );
        Ok(out)
    }

    /// Replaces the first match with `replacement`, keeping its `_id`. Returns the new document.
    ///
    /// # Errors
    /// `QueryError`, `InvalidDocument` if the replacement changes `_id`, context failures, or log I/O.
    pub fn find_one_and_replace(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        mut replacement: Document,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let pred = Predicate::parse(filter)?;
        let col = self.collection(collection);
        let mut col = col.write();
        let Some(id) = find_in(ctx, &col, &pred)? else {
            return Ok(None);
        };
        match replacement.get("_id") {
            None => {
                replacement.insert("_id", id.clone());
            }
            Some(Bson::String(s)) if *s == id => {}
            Some(_) => return Err(StoreError::InvalidDocument("replacement may not change _id".into())),
        }
        self.log(WalOp::Replace, collection, &id, Some(&replacement))?;
        col.replace(&id, replacement.clone());
        log::info!(target: AUDIT_TARGET, "replace collection={collection} id={id}");
        Ok(Some(replacement))
    }

    /// Applies `$set` and `$currentDate` to the first match. Returns the updated document.
    ///
    /// `$currentDate` stamps are strictly increasing per field so consecutive updates stay ordered.
    ///
    /// # Errors
    /// `QueryError` for unsupported update operators, context failures, or log I/O.
    pub fn find_one_and_update(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let pred = Predicate::parse(filter)?;
        let col = self.collection(collection);
        let mut col = col.write();
        let Some(id) = find_in(ctx, &col, &pred)? else {
            return Ok(None);
        };
        let Some(current) = col.get(&id) else {
            return Ok(None);
        };
        let updated = apply_update(current, update)?;
        self.log(WalOp::Replace, collection, &id, Some(&updated))?;
        col.replace(&id, updated.clone());
        log::info!(target: AUDIT_TARGET, "update collection={collection} id={id}");
        Ok(Some(updated))
    }

    /// Removes the first match and returns it.
    ///
    /// # Errors
    /// `QueryError`, context failures, or log I/O.
    pub fn find_one_and_delete(
        &self,
        ctx: &CallContext,
        collection: &str,
        filter: &Document,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let pred = Predicate::parse(filter)?;
        let col = self.collection(collection);
        let mut col = col.write();
        let Some(id) = find_in(ctx, &col, &pred)? else {
            return Ok(None);
        };
        self.log(WalOp::Delete, collection, &id, None)?;
        let removed = col.remove(&id);
        log::info!(target: AUDIT_TARGET, "delete collection={collection} id={id}");
        Ok(removed)
    }
}

fn find_in(ctx: &CallContext, col: &Collection, pred: &Predicate) -> Result<Option<String>, StoreError> {
    if let Some(id) = pred.id_lookup() {
        return Ok(col.contains(id).then(|| id.to_string()));
    }
    for doc in col.iter() {
        ctx.check()?;
        if pred.matches(doc) {
            return Ok(Some(doc_id(doc)?.to_string()));
        }
    }
    Ok(None)
}

fn apply_update(current: &Document, update: &Document) -> Result<Document, StoreError> {
    let mut out = current.clone();
    for (op, arg) in update {
        let Bson::Document(fields) = arg else {
            return Err(StoreError::QueryError(format!("{op} requires a document")));
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == "_id" {
                        return Err(StoreError::InvalidDocument("$set may not change _id".into()));
                    }
                    set_path(&mut out, path, value.clone())?;
                }
            }
            "$currentDate" => {
                let now = chrono::Utc::now().timestamp_millis();
                for (path, _) in fields {
                    let prev = super::predicate::get_path(current, path).and_then(|v| match v {
                        Bson::DateTime(d) => Some(d.timestamp_millis()),
                        _ => None,
                    });
                    let stamp = prev.map_or(now, |p| now.max(p + 1));
                    set_path(&mut out, path, Bson::DateTime(bson::DateTime::from_millis(stamp)))?;
                }
            }
            other => return Err(StoreError::QueryError(format!("unsupported update operator: {other}"))),
        }
    }
    Ok(out)
}

/// Sets a dotted path, creating intermediate documents as needed.
fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<(), StoreError> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(d)) => set_path(d, rest, value),
                _ => Err(StoreError::InvalidDocument(format!("cannot set {path}: {head} is not a document"))),
            }
        }
    }
}

fn encode_body(doc: &Document) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf)?;
    Ok(buf)
}

fn decode_body(body: &[u8]) -> Result<Document, StoreError> {
    let mut reader = body;
    Ok(Document::from_reader(&mut reader)?)
}
