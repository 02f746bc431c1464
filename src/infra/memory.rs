//! Process-local record store used when no database is configured and in tests.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::query::{RecordQuery, cell_text};
use crate::application::repos::{RecordStore, RepoError, patch_fields};
use crate::domain::collections::{Collection, OnDelete};

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<Collection, Vec<Value>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching<'a>(rows: &'a [Value], query: &RecordQuery) -> Vec<&'a Value> {
        let mut matched: Vec<&Value> = rows.iter().filter(|row| query.matches(row)).collect();
        let sort = query.sort;
        matched.sort_by(|left, right| {
            let primary = sort
                .map(|sort| {
                    let ordering =
                        compare_cells(left.get(sort.column.name), right.get(sort.column.name));
                    if sort.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .unwrap_or(Ordering::Equal);
            primary.then_with(|| compare_cells(left.get("id"), right.get("id")))
        });
        matched
    }
}

/// Order cells like Postgres `NULLS LAST`: numbers numerically, everything else as text.
fn compare_cells(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.filter(|value| !value.is_null());
    let right = right.filter(|value| !value.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => cell_text(a).cmp(&cell_text(b)),
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_page(
        &self,
        query: &RecordQuery,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Value>, RepoError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(&query.collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(Self::matching(rows, query)
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        let count = tables
            .get(&query.collection)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(
        &self,
        collection: Collection,
        record: Value,
    ) -> Result<Option<Value>, RepoError> {
        let Some(fields) = record.as_object() else {
            return Err(RepoError::invalid_input("record must be a JSON object"));
        };
        for key in fields.keys() {
            collection.column(key)?;
        }
        let id = row_id(&record)
            .ok_or_else(|| RepoError::invalid_input("record is missing a string `id`"))?
            .to_string();

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();

        if rows.iter().any(|row| row_id(row) == Some(id.as_str())) {
            return Err(RepoError::Duplicate {
                constraint: format!("{}_pkey", collection.table()),
            });
        }
        if let Some(key) = collection.dedup_key() {
            let collides = rows
                .iter()
                .any(|row| key.iter().all(|column| row.get(*column) == record.get(*column)));
            if collides {
                return Ok(None);
            }
        }

        rows.push(record.clone());
        Ok(Some(record))
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RepoError> {
        let fields = patch_fields(collection, &patch)?;
        let id = id.to_string();

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id.as_str())))
            .ok_or(RepoError::NotFound)?;
        let Some(stored) = row.as_object_mut() else {
            return Err(RepoError::from_persistence("stored row is not an object"));
        };
        for (key, value) in fields {
            stored.insert(key.clone(), value.clone());
        }
        Ok(row.clone())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError> {
        let id = id.to_string();
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&collection) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(id.as_str()));
        if rows.len() == before {
            return Ok(false);
        }

        // Apply the foreign key actions the Postgres schema declares.
        let mut pending = vec![(collection, id)];
        while let Some((parent, parent_id)) = pending.pop() {
            for reference in parent.referenced_by() {
                let Some(children) = tables.get_mut(&reference.child) else {
                    continue;
                };
                let points_here = |row: &Value| {
                    row.get(reference.column).and_then(Value::as_str) == Some(parent_id.as_str())
                };
                match reference.on_delete {
                    OnDelete::Cascade => {
                        children.retain(|row| {
                            if !points_here(row) {
                                return true;
                            }
                            if let Some(child_id) = row_id(row) {
                                pending.push((reference.child, child_id.to_string()));
                            }
                            false
                        });
                    }
                    OnDelete::SetNull => {
                        for row in children.iter_mut().filter(|row| points_here(row)) {
                            if let Some(fields) = row.as_object_mut() {
                                fields.insert(reference.column.to_string(), Value::Null);
                            }
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn competitor(id: u8, name: &str) -> Value {
        json!({
            "id": format!("00000000-0000-4000-8000-0000000000{id:02}"),
            "client_id": "7f1d2d7e-0000-4000-8000-000000000001",
            "name": name,
            "platform": null,
            "tags": [],
        })
    }

    #[tokio::test]
    async fn dedup_key_collisions_are_skipped() {
        let store = InMemoryRecordStore::new();
        let first = store
            .insert(Collection::Competitors, competitor(1, "Bolt"))
            .await
            .expect("insert");
        let second = store
            .insert(Collection::Competitors, competitor(2, "Bolt"))
            .await
            .expect("insert");

        assert!(first.is_some());
        assert!(second.is_none());
        let all = RecordQuery::new(Collection::Competitors);
        assert_eq!(store.count(&all).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Clients, json!({"id": "00000000-0000-4000-8000-000000000001"}))
            .await
            .expect("insert");
        let err = store
            .insert(Collection::Clients, json!({"id": "00000000-0000-4000-8000-000000000001"}))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let store = InMemoryRecordStore::new();
        let err = store
            .insert(Collection::Clients, json!({"id": "x", "password": "hunter2"}))
            .await
            .expect_err("unknown column");
        assert!(matches!(err, RepoError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn update_merges_patch_and_delete_removes() {
        let store = InMemoryRecordStore::new();
        let row = competitor(1, "Bolt");
        let id = Uuid::parse_str(row_id(&row).expect("id")).expect("uuid");
        store
            .insert(Collection::Competitors, row)
            .await
            .expect("insert");

        let updated = store
            .update(Collection::Competitors, id, json!({"platform": "tiktok"}))
            .await
            .expect("update");
        assert_eq!(updated["platform"], "tiktok");
        assert_eq!(updated["name"], "Bolt");

        let err = store
            .update(Collection::Competitors, id, json!({"id": "other"}))
            .await
            .expect_err("id is immutable");
        assert!(matches!(err, RepoError::InvalidInput { .. }));

        assert!(store.delete(Collection::Competitors, id).await.expect("delete"));
        assert!(!store.delete(Collection::Competitors, id).await.expect("delete"));
        assert!(matches!(
            store
                .update(Collection::Competitors, id, json!({"name": "x"}))
                .await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn deleting_a_client_cascades_like_the_schema() {
        let store = InMemoryRecordStore::new();
        let client = "7f1d2d7e-0000-4000-8000-000000000001";
        let idea = "7f1d2d7e-0000-4000-8000-0000000000a1";
        let other_client = "7f1d2d7e-0000-4000-8000-000000000002";
        store
            .insert(Collection::Clients, json!({"id": client}))
            .await
            .expect("client");
        store
            .insert(Collection::Competitors, competitor(1, "Bolt"))
            .await
            .expect("competitor");
        store
            .insert(
                Collection::SavedIdeas,
                json!({"id": idea, "client_id": client, "share_token": "tok"}),
            )
            .await
            .expect("idea");
        store
            .insert(
                Collection::Feedback,
                json!({"id": "7f1d2d7e-0000-4000-8000-0000000000f1", "client_id": client, "idea_id": idea}),
            )
            .await
            .expect("feedback");
        store
            .insert(
                Collection::Feedback,
                json!({"id": "7f1d2d7e-0000-4000-8000-0000000000f2", "client_id": other_client, "idea_id": null}),
            )
            .await
            .expect("unrelated feedback");

        let client_id = Uuid::parse_str(client).expect("uuid");
        assert!(store.delete(Collection::Clients, client_id).await.expect("delete"));

        for (collection, expected) in [
            (Collection::Competitors, 0),
            (Collection::SavedIdeas, 0),
            (Collection::Feedback, 1),
        ] {
            let all = RecordQuery::new(collection);
            assert_eq!(store.count(&all).await.expect("count"), expected, "{collection:?}");
        }
    }

    #[tokio::test]
    async fn deleting_an_idea_detaches_its_feedback() {
        let store = InMemoryRecordStore::new();
        let client = "7f1d2d7e-0000-4000-8000-000000000001";
        let idea = "7f1d2d7e-0000-4000-8000-0000000000a1";
        store
            .insert(Collection::SavedIdeas, json!({"id": idea, "client_id": client}))
            .await
            .expect("idea");
        store
            .insert(
                Collection::Feedback,
                json!({"id": "7f1d2d7e-0000-4000-8000-0000000000f1", "client_id": client, "idea_id": idea}),
            )
            .await
            .expect("feedback");

        let idea_id = Uuid::parse_str(idea).expect("uuid");
        assert!(store.delete(Collection::SavedIdeas, idea_id).await.expect("delete"));

        let rows = store
            .fetch_page(&RecordQuery::new(Collection::Feedback), 0, 10)
            .await
            .expect("page");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["idea_id"], Value::Null);
    }

    #[tokio::test]
    async fn sort_places_nulls_last() {
        let store = InMemoryRecordStore::new();
        for (id, platform) in [(1, json!("tiktok")), (2, Value::Null), (3, json!("facebook"))] {
            let mut row = competitor(id, &format!("c{id}"));
            row["platform"] = platform;
            store
                .insert(Collection::Competitors, row)
                .await
                .expect("insert");
        }
        let query = RecordQuery::new(Collection::Competitors)
            .sort_by("platform", false)
            .expect("query");
        let rows = store.fetch_page(&query, 0, 10).await.expect("page");
        let names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
        assert_eq!(names, vec!["c3", "c1", "c2"]);
    }
}
