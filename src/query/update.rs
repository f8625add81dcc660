use bson::{Bson, Document};

/// Single-document update: fields to `$set` and fields stamped by `$currentDate`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub current_date: Vec<String>,
}

impl UpdateDoc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.push((path.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_date(mut self, path: impl Into<String>) -> Self {
        self.current_date.push(path.into());
        self
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        if !self.set.is_empty() {
            let mut set = Document::new();
            for (k, v) in &self.set {
                set.insert(k.clone(), v.clone());
            }
            out.insert("$set", set);
        }
        if !self.current_date.is_empty() {
            let mut cd = Document::new();
            for k in &self.current_date {
                cd.insert(k.clone(), true);
            }
            out.insert("$currentDate", cd);
        }
        out
    }
}
