use bson::{Bson, Document, doc};

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Outcome of an update or upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Documents matched by the query
    pub doc_matched: u64,

    /// Documents actually changed
    pub doc_modified: u64,

    /// `{ "_id": <id> }` when the update inserted a new document
    pub doc_upserted_id: Option<Document>,
}

impl UpdateResult {
    pub fn new(doc_matched: u64, doc_modified: u64, upserted_id: Option<Bson>) -> Self {
        Self {
            doc_matched,
            doc_modified,
            doc_upserted_id: upserted_id.map(|id| doc! { ID_FIELD: id }),
        }
    }

    /// Upserted id rendered as a string, when it is one or an `ObjectId`.
    pub fn upserted_id_string(&self) -> Option<String> {
        match self.doc_upserted_id.as_ref()?.get(ID_FIELD)? {
            Bson::String(id) => Some(id.clone()),
            Bson::ObjectId(oid) => Some(oid.to_hex()),
            _ => None,
        }
    }
}

impl From<mongodb::results::UpdateResult> for UpdateResult {
    fn from(result: mongodb::results::UpdateResult) -> Self {
        Self::new(result.matched_count, result.modified_count, result.upserted_id)
    }
}
