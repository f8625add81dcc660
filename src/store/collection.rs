use bson::{Bson, Document};
use std::collections::{BTreeMap, HashMap};

use crate::errors::StoreError;

/// In-memory document set for one collection, iterated in insertion order.
#[derive(Debug, Default)]
pub struct Collection {
    docs: BTreeMap<u64, Document>,
    ids: HashMap<String, u64>,
    next_seq: u64,
}

/// Extracts the string `_id` every stored document must carry.
///
/// # Errors
/// `InvalidDocument` when `_id` is missing or not a string.
pub(crate) fn doc_id(doc: &Document) -> Result<&str, StoreError> {
    match doc.get("_id") {
        Some(Bson::String(id)) if !id.is_empty() => Ok(id),
        Some(_) => Err(StoreError::InvalidDocument("_id must be a non-empty string".into())),
        None => Err(StoreError::InvalidDocument("missing _id".into())),
    }
}

impl Collection {
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.ids.get(id).and_then(|seq| self.docs.get(seq))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    /// # Errors
    /// `DuplicateKey` if the id is taken, `InvalidDocument` on a bad `_id`.
    pub fn insert(&mut self, doc: Document) -> Result<(), StoreError> {
        let id = doc_id(&doc)?.to_string();
        if self.ids.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ids.insert(id, seq);
        self.docs.insert(seq, doc);
        Ok(())
    }

    /// Swaps the stored document for `doc`, keeping its position. Returns the previous one.
    pub fn replace(&mut self, id: &str, doc: Document) -> Option<Document> {
        let seq = *self.ids.get(id)?;
        self.docs.insert(seq, doc)
    }

    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let seq = self.ids.remove(id)?;
        self.docs.remove(&seq)
    }
}
