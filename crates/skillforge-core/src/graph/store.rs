//! SQLite-backed property graph store
//!
//! Nodes live in `graph_nodes`, unique by `(label, natural_key)`; edges live
//! in `graph_edges`, unique by `(source_id, target_id, edge_type)`. All access
//! goes through a [`GraphTransaction`]: read work uses [`GraphStore::begin`]
//! and is simply dropped, mutations use [`GraphStore::begin_write`] and
//! commit explicitly.
//!
//! Transitive traversals use recursive CTEs with `UNION`, so they terminate
//! even if the followed edges contain a cycle.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::record::{
    Direction, EdgeRecord, EdgeRow, EdgeType, Neighbor, NeighborRow, NodeLabel, NodeRecord,
    NodeRow,
};
use crate::error::{Error, Result};
use crate::storage::Database;

const CLOSURE_CTE: &str = r#"
    WITH RECURSIVE closure(node_id) AS (
        SELECT ?
        UNION
        SELECT e.target_id
        FROM graph_edges e
        JOIN closure c ON e.source_id = c.node_id
        WHERE e.edge_type = ?
    )
"#;

/// Cloneable handle to the graph store
#[derive(Debug, Clone)]
pub struct GraphStore {
    db: Database,
}

impl GraphStore {
    /// Create a store over an opened database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database handle
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Begin a transaction for read-only work
    pub async fn begin(&self) -> Result<GraphTransaction> {
        let tx = self.db.pool().begin().await?;
        Ok(GraphTransaction { tx })
    }

    /// Begin a transaction for mutations.
    ///
    /// The first statement is a write, so the database write lock is held
    /// before anything is matched. Concurrent writers queue on the lock and
    /// each sees the effects of the ones committed before it.
    pub async fn begin_write(&self) -> Result<GraphTransaction> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("UPDATE graph_meta SET value = value + 1 WHERE key = 'write_epoch'")
            .execute(&mut *tx)
            .await?;
        Ok(GraphTransaction { tx })
    }

    /// Counter bumped by every write transaction
    pub async fn write_epoch(&self) -> Result<i64> {
        let (epoch,): (i64,) =
            sqlx::query_as("SELECT value FROM graph_meta WHERE key = 'write_epoch'")
                .fetch_one(self.db.pool())
                .await?;
        Ok(epoch)
    }
}

/// An open store transaction. Dropping it without `commit` rolls back.
pub struct GraphTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl GraphTransaction {
    /// Commit all writes made in this transaction
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard all writes made in this transaction
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    // ========== Node Operations ==========

    /// Find the node with `label` and `key`, creating it with `properties`
    /// if absent. Returns the node and whether it was created.
    pub async fn merge_node(
        &mut self,
        label: NodeLabel,
        key: &str,
        properties: &Value,
    ) -> Result<(NodeRecord, bool)> {
        if let Some(existing) = self.find_node(label, key).await? {
            return Ok((existing, false));
        }

        let node = self
            .insert_node(Uuid::new_v4().to_string(), label, key, properties)
            .await?;
        Ok((node, true))
    }

    /// Create a node identified by a fresh uuid, used as both id and key
    pub async fn create_node(
        &mut self,
        label: NodeLabel,
        properties: &Value,
    ) -> Result<NodeRecord> {
        let id = Uuid::new_v4().to_string();
        let key = id.clone();
        self.insert_node(id, label, &key, properties).await
    }

    async fn insert_node(
        &mut self,
        id: String,
        label: NodeLabel,
        key: &str,
        properties: &Value,
    ) -> Result<NodeRecord> {
        let properties = object_or_empty(properties)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO graph_nodes (id, label, natural_key, properties, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(label.as_str())
        .bind(key)
        .bind(properties.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        debug!(node_id = %id, label = %label, key = %key, "Node created");
        Ok(NodeRecord {
            id,
            label,
            key: key.to_string(),
            properties,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_node(&mut self, label: NodeLabel, key: &str) -> Result<Option<NodeRecord>> {
        let row: Option<NodeRow> =
            sqlx::query_as("SELECT * FROM graph_nodes WHERE label = ? AND natural_key = ?")
                .bind(label.as_str())
                .bind(key)
                .fetch_optional(&mut *self.tx)
                .await?;

        row.map(NodeRow::into_record).transpose()
    }

    pub async fn find_node_by_id(&mut self, id: &str) -> Result<Option<NodeRecord>> {
        let row: Option<NodeRow> = sqlx::query_as("SELECT * FROM graph_nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(NodeRow::into_record).transpose()
    }

    /// All nodes carrying `label`, ordered by key
    pub async fn find_nodes(&mut self, label: NodeLabel) -> Result<Vec<NodeRecord>> {
        let rows: Vec<NodeRow> =
            sqlx::query_as("SELECT * FROM graph_nodes WHERE label = ? ORDER BY natural_key")
                .bind(label.as_str())
                .fetch_all(&mut *self.tx)
                .await?;

        rows.into_iter().map(NodeRow::into_record).collect()
    }

    /// Merge `patch` into the node's properties. A `null` value removes
    /// the key. Returns false if the node does not exist.
    pub async fn set_properties(&mut self, id: &str, patch: &Value) -> Result<bool> {
        let patch = object_or_empty(patch)?;
        let result = sqlx::query(
            r#"
            UPDATE graph_nodes SET properties = json_patch(properties, ?), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Change a node's natural key. Edges follow the node.
    pub async fn rekey_node(&mut self, id: &str, new_key: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE graph_nodes SET natural_key = ?, updated_at = ? WHERE id = ?")
                .bind(new_key)
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a node together with every edge touching it
    pub async fn delete_node(&mut self, id: &str) -> Result<bool> {
        sqlx::query("DELETE FROM graph_edges WHERE source_id = ? OR target_id = ?")
            .bind(id)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        let result = sqlx::query("DELETE FROM graph_nodes WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!(node_id = %id, "Node deleted");
        }
        Ok(deleted)
    }

    pub async fn count_nodes(&mut self, label: NodeLabel) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_nodes WHERE label = ?")
            .bind(label.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count as u64)
    }

    // ========== Edge Operations ==========

    /// Create `(source)-[edge_type]->(target)` unless it already exists.
    /// `properties` apply only on creation. Returns whether it was created.
    pub async fn merge_edge(
        &mut self,
        source_id: &str,
        edge_type: EdgeType,
        target_id: &str,
        properties: &Value,
    ) -> Result<bool> {
        let properties = object_or_empty(properties)?;
        let result = sqlx::query(
            r#"
            INSERT INTO graph_edges (id, source_id, target_id, edge_type, properties, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id, target_id, edge_type) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(source_id)
        .bind(target_id)
        .bind(edge_type.as_str())
        .bind(properties.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *self.tx)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            debug!(
                source_id = %source_id,
                edge_type = %edge_type,
                target_id = %target_id,
                "Edge created"
            );
        }
        Ok(created)
    }

    /// Merge `patch` into an edge's properties. Returns false if the edge
    /// does not exist.
    pub async fn set_edge_properties(
        &mut self,
        source_id: &str,
        edge_type: EdgeType,
        target_id: &str,
        patch: &Value,
    ) -> Result<bool> {
        let patch = object_or_empty(patch)?;
        let result = sqlx::query(
            r#"
            UPDATE graph_edges SET properties = json_patch(properties, ?)
            WHERE source_id = ? AND edge_type = ? AND target_id = ?
            "#,
        )
        .bind(patch.to_string())
        .bind(source_id)
        .bind(edge_type.as_str())
        .bind(target_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_edge(
        &mut self,
        source_id: &str,
        edge_type: EdgeType,
        target_id: &str,
    ) -> Result<Option<EdgeRecord>> {
        let row: Option<EdgeRow> = sqlx::query_as(
            "SELECT * FROM graph_edges WHERE source_id = ? AND edge_type = ? AND target_id = ?",
        )
        .bind(source_id)
        .bind(edge_type.as_str())
        .bind(target_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(EdgeRow::into_record).transpose()
    }

    /// Remove one edge. Returns whether it existed.
    pub async fn delete_edge(
        &mut self,
        source_id: &str,
        edge_type: EdgeType,
        target_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM graph_edges WHERE source_id = ? AND edge_type = ? AND target_id = ?",
        )
        .bind(source_id)
        .bind(edge_type.as_str())
        .bind(target_id)
        .execute(&mut *self.tx)
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!(
                source_id = %source_id,
                edge_type = %edge_type,
                target_id = %target_id,
                "Edge deleted"
            );
        }
        Ok(deleted)
    }

    /// Remove every `edge_type` edge leaving `source_id`, returning the
    /// ids of the nodes they pointed at
    pub async fn delete_edges_from(
        &mut self,
        source_id: &str,
        edge_type: EdgeType,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "DELETE FROM graph_edges WHERE source_id = ? AND edge_type = ? RETURNING target_id",
        )
        .bind(source_id)
        .bind(edge_type.as_str())
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(|(target,)| target).collect())
    }

    pub async fn count_edges(&mut self, edge_type: Option<EdgeType>) -> Result<u64> {
        let (count,): (i64,) = match edge_type {
            Some(edge_type) => {
                sqlx::query_as("SELECT COUNT(*) FROM graph_edges WHERE edge_type = ?")
                    .bind(edge_type.as_str())
                    .fetch_one(&mut *self.tx)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM graph_edges")
                    .fetch_one(&mut *self.tx)
                    .await?
            }
        };
        Ok(count as u64)
    }

    // ========== Pattern Matching ==========

    /// One-hop match over `edge_type` edges, ordered by the neighbor's key
    pub async fn neighbors(
        &mut self,
        node_id: &str,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Neighbor>> {
        let (anchor, far) = match direction {
            Direction::Outgoing => ("source_id", "target_id"),
            Direction::Incoming => ("target_id", "source_id"),
        };

        let query = format!(
            r#"
            SELECT
                e.id AS edge_id,
                e.source_id AS edge_source_id,
                e.target_id AS edge_target_id,
                e.edge_type AS edge_type,
                e.properties AS edge_properties,
                e.created_at AS edge_created_at,
                n.id AS node_id,
                n.label AS node_label,
                n.natural_key AS node_natural_key,
                n.properties AS node_properties,
                n.created_at AS node_created_at,
                n.updated_at AS node_updated_at
            FROM graph_edges e
            JOIN graph_nodes n ON n.id = e.{far}
            WHERE e.{anchor} = ? AND e.edge_type = ?
            ORDER BY n.natural_key
            "#
        );

        let rows: Vec<NeighborRow> = sqlx::query_as(&query)
            .bind(node_id)
            .bind(edge_type.as_str())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(NeighborRow::into_neighbor).collect()
    }

    /// `(node)-[edge_type]->(target)` matches
    pub async fn targets(&mut self, node_id: &str, edge_type: EdgeType) -> Result<Vec<Neighbor>> {
        self.neighbors(node_id, edge_type, Direction::Outgoing).await
    }

    /// `(source)-[edge_type]->(node)` matches
    pub async fn sources(&mut self, node_id: &str, edge_type: EdgeType) -> Result<Vec<Neighbor>> {
        self.neighbors(node_id, edge_type, Direction::Incoming).await
    }

    // ========== Traversal ==========

    /// Every node reachable from `start_id` over zero or more `edge_type`
    /// edges, the start node included, ordered by key
    pub async fn reachable(
        &mut self,
        start_id: &str,
        edge_type: EdgeType,
    ) -> Result<Vec<NodeRecord>> {
        let query = format!(
            r#"{CLOSURE_CTE}
            SELECT n.*
            FROM graph_nodes n
            JOIN closure c ON n.id = c.node_id
            ORDER BY n.natural_key
            "#
        );

        let rows: Vec<NodeRow> = sqlx::query_as(&query)
            .bind(start_id)
            .bind(edge_type.as_str())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(NodeRow::into_record).collect()
    }

    /// `(source_id, target_id)` of every `edge_type` edge inside the
    /// closure reachable from `start_id`
    pub async fn closure_edges(
        &mut self,
        start_id: &str,
        edge_type: EdgeType,
    ) -> Result<Vec<(String, String)>> {
        let query = format!(
            r#"{CLOSURE_CTE}
            SELECT e.source_id, e.target_id
            FROM graph_edges e
            WHERE e.edge_type = ? AND e.source_id IN (SELECT node_id FROM closure)
            ORDER BY e.source_id, e.target_id
            "#
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&query)
            .bind(start_id)
            .bind(edge_type.as_str())
            .bind(edge_type.as_str())
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows)
    }

    /// Whether `to_id` is reachable from `from_id` over zero or more
    /// `edge_type` edges
    pub async fn path_exists(
        &mut self,
        from_id: &str,
        to_id: &str,
        edge_type: EdgeType,
    ) -> Result<bool> {
        let query =
            format!("{CLOSURE_CTE} SELECT EXISTS(SELECT 1 FROM closure WHERE node_id = ?)");

        let (exists,): (bool,) = sqlx::query_as(&query)
            .bind(from_id)
            .bind(edge_type.as_str())
            .bind(to_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(exists)
    }
}

fn object_or_empty(value: &Value) -> Result<Value> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::Null => Ok(Value::Object(Default::default())),
        other => Err(Error::InvalidInput(format!(
            "Graph properties must be a JSON object, got {}",
            other
        ))),
    }
}
