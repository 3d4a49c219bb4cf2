//! Options accepted by the client façade
//!
//! Each type converts into the matching driver options struct.

use std::time::Duration;

use bson::Document;

/// Options for `find_batch_with_options`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Projection document
    pub fields: Option<Document>,

    /// Sort document
    pub sort: Option<Document>,

    /// Maximum number of documents
    pub limit: Option<i64>,

    /// Number of documents to skip
    pub skip: Option<u64>,

    /// Server batch size; defaults to the client's configured batch size
    pub batch_size: Option<u32>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fields(mut self, fields: Document) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn set_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn set_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn set_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Driver options, using `default_batch_size` when none was set.
    pub(crate) fn to_driver(&self, default_batch_size: u32) -> mongodb::options::FindOptions {
        let mut options = mongodb::options::FindOptions::default();
        options.projection = self.fields.clone();
        options.sort = self.sort.clone();
        options.limit = self.limit;
        options.skip = self.skip;
        options.batch_size = Some(self.batch_size.unwrap_or(default_batch_size));
        options
    }
}

/// Options for `update_collection_with_options`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a document when nothing matches
    pub upsert: bool,

    /// Update every matching document instead of the first
    pub multi: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn set_multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub(crate) fn to_driver(self) -> mongodb::options::UpdateOptions {
        let mut options = mongodb::options::UpdateOptions::default();
        if self.upsert {
            options.upsert = Some(true);
        }
        options
    }
}

/// Options for `aggregate_with_options`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Server batch size; defaults to the client's configured batch size
    pub batch_size: Option<u32>,

    /// Allow stages to spill to disk
    pub allow_disk_use: bool,

    /// Server-side time limit
    pub max_time: Option<Duration>,
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn set_allow_disk_use(mut self, allow: bool) -> Self {
        self.allow_disk_use = allow;
        self
    }

    pub fn set_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub(crate) fn to_driver(&self, default_batch_size: u32) -> mongodb::options::AggregateOptions {
        let mut options = mongodb::options::AggregateOptions::default();
        options.batch_size = Some(self.batch_size.unwrap_or(default_batch_size));
        if self.allow_disk_use {
            options.allow_disk_use = Some(true);
        }
        options.max_time = self.max_time;
        options
    }
}
