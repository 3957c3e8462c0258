//! Qdrant implementation of the vector index.

use std::collections::HashMap;

use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

use reunite_core::{Embedding, EMBEDDING_DIM};

use super::{FaceHit, FacePayload, IndexError};

/// Qdrant-backed face vector index.
///
/// One cosine-distance collection; points are keyed by person id so a
/// repeated upsert replaces rather than duplicates.
pub struct QdrantFaceIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantFaceIndex {
    /// Connect to Qdrant, creating the collection if it does not exist.
    pub async fn connect(
        url: &str,
        api_key: Option<&str>,
        collection: &str,
    ) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| IndexError::Connection(e.to_string()))?;

        let exists = client
            .collection_exists(collection)
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;

        if !exists {
            client
                .create_collection(
                    CreateCollectionBuilder::new(collection).vectors_config(
                        VectorParamsBuilder::new(EMBEDDING_DIM as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| IndexError::Connection(e.to_string()))?;
            tracing::info!(collection, "Created qdrant collection");
        }

        tracing::info!(collection, "Vector index connected");

        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    pub async fn search(
        &self,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<FaceHit>, IndexError> {
        let filter = Filter::all([Condition::matches("verified", true)]);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.clone(), embedding.to_vec(), top_k as u64)
                    .filter(filter)
                    .with_payload(true),
            )
            .await
            .map_err(|e| IndexError::Query(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| FaceHit {
                score: point.score,
                payload: payload_to_json(point.payload),
            })
            .collect())
    }

    pub async fn upsert(
        &self,
        person_id: Uuid,
        embedding: &Embedding,
        payload: &FacePayload,
    ) -> Result<(), IndexError> {
        let payload_value = serde_json::to_value(payload)
            .map_err(|e| IndexError::Query(format!("payload serialization failed: {e}")))?;
        let payload = Payload::try_from(payload_value)
            .map_err(|e| IndexError::Query(format!("payload conversion failed: {e}")))?;

        let point = PointStruct::new(person_id.to_string(), embedding.to_vec(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]))
            .await
            .map_err(|e| IndexError::Query(e.to_string()))?;

        Ok(())
    }
}

/// Convert a qdrant payload into plain JSON for the shared decoder.
fn payload_to_json(payload: HashMap<String, qdrant_client::qdrant::Value>) -> serde_json::Value {
    serde_json::Value::Object(
        payload
            .into_iter()
            .map(|(key, value)| (key, qdrant_value_to_json(value)))
            .collect(),
    )
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;

    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => serde_json::Value::Array(
            list.values.into_iter().map(qdrant_value_to_json).collect(),
        ),
        Some(Kind::StructValue(object)) => serde_json::Value::Object(
            object
                .fields
                .into_iter()
                .map(|(key, value)| (key, qdrant_value_to_json(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::Value;

    #[test]
    fn test_qdrant_value_conversion() {
        let mut payload = HashMap::new();
        payload.insert("person_id".to_string(), Value::from("abc"));
        payload.insert("verified".to_string(), Value::from(true));
        payload.insert("rank".to_string(), Value::from(3_i64));

        let json = payload_to_json(payload);
        assert_eq!(json["person_id"], "abc");
        assert_eq!(json["verified"], true);
        assert_eq!(json["rank"], 3);
    }
}
