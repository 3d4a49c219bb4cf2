//! Thin client façade over the MongoDB driver
//!
//! Collection and document operations forward to the driver; queries that
//! return cursors (`find_batch*`, `aggregate*`) hand back a [`ReadStream`].
//!
//! Unless `use_object_id` is set, identifiers generated by the client are
//! `ObjectId` hex strings rather than `ObjectId` values, for inserts and for
//! documents created by an upsert alike.

pub mod options;
pub mod result;

use bson::oid::ObjectId;
use bson::{Bson, Document, RawDocumentBuf, doc};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::{ClientError, Result};
use crate::stream::{MongoBatchCursor, ReadStream};

pub use options::{AggregateOptions, FindOptions, UpdateOptions};
pub use result::{ID_FIELD, UpdateResult};

/// MongoDB client bound to one database.
pub struct MongoClient {
    connection: ConnectionManager,
    database: Database,
    config: Config,
}

impl MongoClient {
    /// Connect using `config.connection` and select `config.connection.db_name`.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;

        let mut connection = ConnectionManager::new(config.connection.clone());
        connection.connect().await?;
        let database = connection.get_database(&config.connection.db_name)?;

        info!(
            "Client ready on database '{}' (batch size {})",
            config.connection.db_name, config.stream.batch_size
        );

        Ok(Self {
            connection,
            database,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Create a collection
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        debug!("Creating collection '{}'", name);
        self.database.create_collection(name).await?;
        Ok(())
    }

    /// Drop a collection
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        debug!("Dropping collection '{}'", name);
        self.collection(name).drop().await?;
        Ok(())
    }

    /// Names of the collections in the database
    pub async fn get_collections(&self) -> Result<Vec<String>> {
        Ok(self.database.list_collection_names().await?)
    }

    /// Insert a document
    ///
    /// # Returns
    /// * `Result<Option<String>>` - Generated id, or `None` when the document
    ///   already carried one
    pub async fn insert(&self, collection: &str, mut document: Document) -> Result<Option<String>> {
        let generated = ensure_id(&mut document, self.config.connection.use_object_id);
        debug!("Executing insert on collection '{}'", collection);

        self.collection(collection).insert_one(document).await?;
        Ok(generated)
    }

    /// Update with default options (first match, no upsert)
    pub async fn update_collection(
        &self,
        collection: &str,
        query: Document,
        update: Document,
    ) -> Result<UpdateResult> {
        self.update_collection_with_options(collection, query, update, UpdateOptions::default())
            .await
    }

    /// Update documents matching `query`
    ///
    /// With `upsert` and string ids, a generated `_id` is added through
    /// `$setOnInsert` so an inserted document gets a hex string id.
    pub async fn update_collection_with_options(
        &self,
        collection: &str,
        query: Document,
        update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        if !is_operator_update(&update) {
            return Err(ClientError::Generic(
                "update document must only contain update operators".to_string(),
            ));
        }

        let update = if options.upsert && !self.config.connection.use_object_id {
            with_generated_id(&query, update)
        } else {
            update
        };

        debug!(
            "Executing update on collection '{}' with filter: {:?} (upsert: {}, multi: {})",
            collection, query, options.upsert, options.multi
        );

        let coll = self.collection(collection);
        let result = if options.multi {
            coll.update_many(query, update)
                .with_options(options.to_driver())
                .await?
        } else {
            coll.update_one(query, update)
                .with_options(options.to_driver())
                .await?
        };

        Ok(result.into())
    }

    /// First document matching `query`
    pub async fn find_one(&self, collection: &str, query: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(query).await?)
    }

    /// Number of documents matching `query`
    pub async fn count(&self, collection: &str, query: Document) -> Result<u64> {
        Ok(self.collection(collection).count_documents(query).await?)
    }

    /// Stream every document matching `query`
    pub async fn find_batch(&self, collection: &str, query: Document) -> Result<ReadStream> {
        self.find_batch_with_options(collection, query, FindOptions::default())
            .await
    }

    /// Stream documents matching `query`, decoded into `T`
    ///
    /// The cursor is opened before returning; failures to open it are
    /// returned here, later failures go to the stream's exception handler.
    pub async fn find_batch_with_options<T>(
        &self,
        collection: &str,
        query: Document,
        options: FindOptions,
    ) -> Result<ReadStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let batch_size = options.batch_size.unwrap_or(self.config.stream.batch_size);
        info!(
            "Opening find cursor on collection '{}' with filter: {:?}",
            collection, query
        );

        let cursor = self
            .collection(collection)
            .find(query)
            .with_options(options.to_driver(self.config.stream.batch_size))
            .await?
            .with_type::<RawDocumentBuf>();

        Ok(ReadStream::new(Box::new(MongoBatchCursor::find(
            cursor, batch_size,
        ))))
    }

    /// Stream the results of an aggregation pipeline
    pub async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<ReadStream> {
        self.aggregate_with_options(collection, pipeline, AggregateOptions::default())
            .await
    }

    /// Stream the results of an aggregation pipeline, decoded into `T`
    pub async fn aggregate_with_options<T>(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> Result<ReadStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let batch_size = options.batch_size.unwrap_or(self.config.stream.batch_size);
        info!(
            "Opening aggregate cursor on collection '{}' with {} pipeline stages",
            collection,
            pipeline.len()
        );

        let cursor = self
            .collection(collection)
            .aggregate(pipeline)
            .with_options(options.to_driver(self.config.stream.batch_size))
            .await?
            .with_type::<RawDocumentBuf>();

        Ok(ReadStream::new(Box::new(MongoBatchCursor::aggregate(
            cursor, batch_size,
        ))))
    }

    /// Collect every document matching `query` into memory
    pub async fn find(&self, collection: &str, query: Document) -> Result<Vec<Document>> {
        let cursor = self.collection(collection).find(query).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Shut down the driver client
    pub async fn close(mut self) -> Result<()> {
        self.connection.disconnect().await
    }
}

/// Give `document` an `_id` when it lacks one.
///
/// Returns the generated id as a hex string.
fn ensure_id(document: &mut Document, use_object_id: bool) -> Option<String> {
    if document.contains_key(ID_FIELD) {
        return None;
    }

    let oid = ObjectId::new();
    let id = if use_object_id {
        Bson::ObjectId(oid)
    } else {
        Bson::String(oid.to_hex())
    };
    document.insert(ID_FIELD, id);
    Some(oid.to_hex())
}

/// True when every top-level key is an update operator (`$set`, ...).
fn is_operator_update(update: &Document) -> bool {
    !update.is_empty() && update.keys().all(|key| key.starts_with('$'))
}

/// Add `$setOnInsert: { _id: <hex> }` unless the query or update already
/// determines the id.
fn with_generated_id(query: &Document, mut update: Document) -> Document {
    if query.contains_key(ID_FIELD) || sets_id(&update) {
        return update;
    }

    let id = ObjectId::new().to_hex();
    match update.get_mut("$setOnInsert") {
        Some(Bson::Document(set_on_insert)) => {
            set_on_insert.insert(ID_FIELD, id);
        }
        _ => {
            update.insert("$setOnInsert", doc! { ID_FIELD: id });
        }
    }
    update
}

fn sets_id(update: &Document) -> bool {
    update
        .values()
        .any(|value| matches!(value, Bson::Document(fields) if fields.contains_key(ID_FIELD)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_id_generates_hex_string() {
        let mut document = doc! { "foo": "bar" };
        let id = ensure_id(&mut document, false).unwrap();

        assert_eq!(id.len(), 24);
        assert_eq!(document.get_str(ID_FIELD).unwrap(), id);
    }

    #[test]
    fn test_ensure_id_generates_object_id() {
        let mut document = doc! { "foo": "bar" };
        let id = ensure_id(&mut document, true).unwrap();

        assert_eq!(document.get_object_id(ID_FIELD).unwrap().to_hex(), id);
    }

    #[test]
    fn test_ensure_id_keeps_existing_id() {
        let mut document = doc! { "_id": 7, "foo": "bar" };
        assert!(ensure_id(&mut document, false).is_none());
        assert_eq!(document.get_i32(ID_FIELD).unwrap(), 7);
    }

    #[test]
    fn test_generated_id_added_on_insert_only() {
        let update = with_generated_id(&doc! { "foo": "bar" }, doc! { "$set": { "foo": "bar" } });
        let set_on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(set_on_insert.get_str(ID_FIELD).unwrap().len(), 24);
        assert_eq!(update.get_document("$set").unwrap(), &doc! { "foo": "bar" });
    }

    #[test]
    fn test_generated_id_merges_existing_set_on_insert() {
        let update = with_generated_id(
            &doc! { "foo": "bar" },
            doc! {
                "$set": { "foo": "bar" },
                "$setOnInsert": { "a-field": "an-entry" },
            },
        );
        let set_on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(set_on_insert.get_str("a-field").unwrap(), "an-entry");
        assert!(set_on_insert.contains_key(ID_FIELD));
    }

    #[test]
    fn test_generated_id_skipped_when_id_is_fixed() {
        let update = doc! { "$set": { "foo": "bar" } };
        assert_eq!(
            with_generated_id(&doc! { "_id": "abc" }, update.clone()),
            update
        );

        let update = doc! { "$set": { "_id": "abc", "foo": "bar" } };
        assert_eq!(with_generated_id(&doc! { "foo": "bar" }, update.clone()), update);
    }

    #[test]
    fn test_operator_update_detection() {
        assert!(is_operator_update(&doc! { "$set": { "a": 1 } }));
        assert!(!is_operator_update(&doc! { "a": 1 }));
        assert!(!is_operator_update(&doc! {}));
    }
}
