use crate::error::Result;
use crate::k8s::informer::{ObjectKey, SearchIndex, TaggedObject, WatchedResource};
use async_trait::async_trait;
use kube::ResourceExt;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Search index over watched objects, persisted in `SQLite`
#[derive(Debug, Clone)]
pub struct SqliteSearchIndex {
    pool: SqlitePool,
}

/// One indexed row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IndexedObject {
    pub key: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub api_version: String,
    pub resource_version: String,
    pub labels: String,
    pub body: String,
}

impl SqliteSearchIndex {
    /// Open (creating if needed) the index database at `db_location`
    ///
    /// # Errors
    ///
    /// Will return `Err` if the db file cannot be created or the table cannot be set up
    pub async fn open(db_location: &str) -> Result<Self> {
        let db_url = format!("sqlite:{db_location}");
        if Path::new(db_location).exists() {
            info!("adding to index db {}", db_url);
        } else {
            info!("creating index db {}", db_url);
            File::create(db_location)?;
        }

        let pool = SqlitePool::connect(&db_url).await?;
        let index = Self { pool };
        index.create_table().await?;
        Ok(index)
    }

    /// Index kept in memory for the lifetime of the process
    ///
    /// # Errors
    ///
    /// Will return `Err` if the in-memory database cannot be set up
    pub async fn in_memory() -> Result<Self> {
        // a single connection: each sqlite memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let index = Self { pool };
        index.create_table().await?;
        Ok(index)
    }

    async fn create_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                key TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                api_version TEXT NOT NULL,
                resource_version TEXT NOT NULL,
                labels TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_namespace ON objects (namespace);
            CREATE INDEX IF NOT EXISTS idx_kind ON objects (kind);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert<K: WatchedResource>(&self, tagged: &TaggedObject<K>) -> Result<()> {
        let labels = serde_json::to_string(tagged.object.labels())?;
        let body = serde_json::to_string(&tagged.object)?;

        sqlx::query(
            r#"
            INSERT INTO objects (key, namespace, name, kind, api_version, resource_version, labels, body)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                resource_version = excluded.resource_version,
                labels = excluded.labels,
                body = excluded.body
            "#,
        )
        .bind(tagged.key.to_string())
        .bind(tagged.key.namespace.clone().unwrap_or_default())
        .bind(tagged.key.name.clone())
        .bind(tagged.type_tag.kind.clone())
        .bind(tagged.type_tag.api_version.clone())
        .bind(tagged.object.resource_version().unwrap_or_default())
        .bind(labels)
        .bind(body)
        .execute(&self.pool)
        .await?;

        debug!("indexed {}", tagged.key);
        Ok(())
    }

    /// Remove an object. Removing an unknown key is not an error.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the delete statement fails
    pub async fn remove(&self, key: &ObjectKey) -> Result<()> {
        let result = sqlx::query("DELETE FROM objects WHERE key = ?")
            .bind(key.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            debug!("{} was not indexed", key);
        }
        Ok(())
    }

    /// Keys of objects whose name, namespace or labels contain `term`
    ///
    /// # Errors
    ///
    /// Will return `Err` if the query fails
    pub async fn search(&self, term: &str) -> Result<Vec<String>> {
        let pattern = format!("%{term}%");
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM objects WHERE name LIKE ? OR namespace LIKE ? OR labels LIKE ? ORDER BY key",
        )
        .bind(pattern.clone())
        .bind(pattern.clone())
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    /// # Errors
    ///
    /// Will return `Err` if the query fails
    pub async fn get(&self, key: &ObjectKey) -> Result<Option<IndexedObject>> {
        let row = sqlx::query_as::<_, IndexedObject>("SELECT * FROM objects WHERE key = ?")
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Will return `Err` if the query fails
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM objects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl<K: WatchedResource> SearchIndex<K> for SqliteSearchIndex {
    async fn on_add(&self, object: &TaggedObject<K>) -> Result<()> {
        self.upsert(object).await
    }

    async fn on_update(&self, _previous: &TaggedObject<K>, current: &TaggedObject<K>) -> Result<()> {
        self.upsert(current).await
    }

    async fn on_delete(&self, object: &TaggedObject<K>) -> Result<()> {
        self.remove(&object.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::informer::TypeTag;
    use crate::k8s::snapshot::{Snapshot, SnapshotSpec};
    use std::collections::BTreeMap;

    fn tagged(name: &str, env: &str, version: &str) -> TaggedObject<Snapshot> {
        let mut object = Snapshot::new(
            name,
            SnapshotSpec {
                database_name: "pg-main".to_string(),
                ..SnapshotSpec::default()
            },
        );
        object.metadata.namespace = Some("demo".to_string());
        object.metadata.resource_version = Some(version.to_string());
        object.metadata.labels = Some(BTreeMap::from([("env".to_string(), env.to_string())]));
        TaggedObject {
            type_tag: TypeTag::of::<Snapshot>(),
            key: ObjectKey::new(Some("demo"), name),
            object,
        }
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let index = SqliteSearchIndex::in_memory().await.unwrap();
        let first = tagged("snap-1", "prod", "1");

        index.on_add(&first).await.unwrap();
        // re-delivered add after a re-list
        index.on_add(&first).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let second = tagged("snap-1", "qa", "2");
        index.on_update(&first, &second).await.unwrap();
        let row = index.get(&second.key).await.unwrap().unwrap();
        assert_eq!(row.resource_version, "2");
        assert_eq!(row.kind, "Snapshot");
        assert!(row.labels.contains("qa"));

        SearchIndex::<Snapshot>::on_delete(&index, &second).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        // deleting again is harmless
        SearchIndex::<Snapshot>::on_delete(&index, &second).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_by_name_and_label() {
        let index = SqliteSearchIndex::in_memory().await.unwrap();
        index.on_add(&tagged("nightly-1", "prod", "1")).await.unwrap();
        index.on_add(&tagged("weekly-1", "staging", "2")).await.unwrap();

        assert_eq!(index.search("nightly").await.unwrap(), vec!["nightly-1@demo"]);
        assert_eq!(index.search("staging").await.unwrap(), vec!["weekly-1@demo"]);
        assert_eq!(index.search("demo").await.unwrap().len(), 2);
        assert!(index.search("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_db_file() {
        let db_location =
            std::env::temp_dir().join(format!("snapwatch-index-{}.db", uuid::Uuid::new_v4()));
        let db_location = db_location.to_str().unwrap().to_string();

        let index = SqliteSearchIndex::open(&db_location).await.unwrap();
        assert!(Path::new(&db_location).exists());
        assert_eq!(index.count().await.unwrap(), 0);

        let _ = std::fs::remove_file(&db_location);
    }
}
