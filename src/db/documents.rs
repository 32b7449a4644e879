//! Document tree queries.

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::errors::{AppError, ResultExt};
use crate::models::{DocumentNode, DocumentType, NewDocument, ROOT_PARENT_ID};

const DOCUMENT_COLUMNS: &str = "id, parent_id, name, type, url, is_private, created_at";

/// Ids per soft-delete statement, well under SQLite's bound-parameter limit.
const DELETE_CHUNK: usize = 500;

/// Insert a node. Returns `None` when the parent is not a live directory.
pub async fn insert(
    conn: &mut SqliteConnection,
    document: &NewDocument,
    url: &str,
) -> Result<Option<DocumentNode>, AppError> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"INSERT INTO documents (parent_id, name, type, url, is_private, created_at, updated_at)
           SELECT ?, ?, ?, ?, ?, ?, ?
           WHERE ? OR EXISTS (
               SELECT 1 FROM documents WHERE id = ? AND type = ? AND deleted_at IS NULL
           )
           RETURNING {}"#,
        DOCUMENT_COLUMNS
    ))
    .bind(document.parent_id)
    .bind(&document.name)
    .bind(document.doc_type.as_str())
    .bind(url)
    .bind(document.is_private)
    .bind(now)
    .bind(now)
    .bind(document.parent_id == ROOT_PARENT_ID)
    .bind(document.parent_id)
    .bind(DocumentType::Dir.as_str())
    .fetch_optional(&mut *conn)
    .await
    .context("insert document")?;

    row.as_ref().map(document_from_row).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<DocumentNode>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM documents WHERE id = ? AND deleted_at IS NULL",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("find document")?;

    row.as_ref().map(document_from_row).transpose()
}

/// Ids of the live direct children of a node.
pub async fn find_child_ids(conn: &mut SqliteConnection, parent_id: i64) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM documents WHERE parent_id = ? AND deleted_at IS NULL ORDER BY id",
    )
    .bind(parent_id)
    .fetch_all(&mut *conn)
    .await
    .context("find document children")?;

    Ok(ids)
}

/// Live direct children, directories first then by name.
pub async fn list_children(
    conn: &mut SqliteConnection,
    parent_id: i64,
    include_private: bool,
) -> Result<Vec<DocumentNode>, AppError> {
    let rows = sqlx::query(&format!(
        r#"SELECT {} FROM documents
           WHERE parent_id = ? AND deleted_at IS NULL AND (? OR is_private = 0)
           ORDER BY CASE type WHEN 'dir' THEN 0 ELSE 1 END, name, id"#,
        DOCUMENT_COLUMNS
    ))
    .bind(parent_id)
    .bind(include_private)
    .fetch_all(&mut *conn)
    .await
    .context("list documents")?;

    rows.iter().map(document_from_row).collect()
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    is_private: bool,
) -> Result<Option<DocumentNode>, AppError> {
    let row = sqlx::query(&format!(
        "UPDATE documents SET name = ?, is_private = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING {}",
        DOCUMENT_COLUMNS
    ))
    .bind(name)
    .bind(is_private)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("update document")?;

    row.as_ref().map(document_from_row).transpose()
}

/// Soft-delete every listed node, a bounded chunk of ids per statement.
///
/// Callers run this inside their transaction so the whole set goes at once.
pub async fn soft_delete_many(conn: &mut SqliteConnection, ids: &[i64]) -> Result<u64, AppError> {
    let now = Utc::now();
    let mut removed = 0;

    for chunk in ids.chunks(DELETE_CHUNK) {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE documents SET deleted_at = ");
        query.push_bind(now);
        query.push(" WHERE deleted_at IS NULL AND id IN (");
        let mut separated = query.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = query
            .build()
            .execute(&mut *conn)
            .await
            .context("delete documents")?;
        removed += result.rows_affected();
    }

    Ok(removed)
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentNode, AppError> {
    let raw_type: String = row.try_get("type").context("decode document type")?;
    let doc_type = DocumentType::parse(&raw_type)
        .ok_or_else(|| AppError::Database(format!("unknown document type: {}", raw_type)))?;

    Ok(DocumentNode {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        name: row.get("name"),
        doc_type,
        url: row.get("url"),
        is_private: row.get("is_private"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::TestDb;

    fn new_dir(parent_id: i64, name: &str) -> NewDocument {
        NewDocument {
            parent_id,
            name: name.to_string(),
            doc_type: DocumentType::Dir,
            is_private: false,
        }
    }

    #[tokio::test]
    async fn test_insert_refuses_removed_parent() {
        let db = TestDb::new().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let parent = insert(&mut conn, &new_dir(ROOT_PARENT_ID, "Minutes"), "")
            .await
            .unwrap()
            .unwrap();
        soft_delete_many(&mut conn, &[parent.id]).await.unwrap();

        let orphan = insert(&mut conn, &new_dir(parent.id, "2025"), "").await.unwrap();
        assert!(orphan.is_none());
        assert!(find_child_ids(&mut conn, parent.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_refuses_file_parent() {
        let db = TestDb::new().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let file = NewDocument {
            parent_id: ROOT_PARENT_ID,
            name: "rules.pdf".to_string(),
            doc_type: DocumentType::File,
            is_private: false,
        };
        let file = insert(&mut conn, &file, "memory://1/rules.pdf").await.unwrap().unwrap();

        assert!(insert(&mut conn, &new_dir(file.id, "nested"), "").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_many_beyond_parameter_limit() {
        let db = TestDb::new().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let root = insert(&mut conn, &new_dir(ROOT_PARENT_ID, "archive"), "")
            .await
            .unwrap()
            .unwrap();

        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO documents (parent_id, name, type, url, is_private, created_at, updated_at)
               WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000)
               SELECT ?, 'scan-' || n, 'file', '', 0, ?, ? FROM seq"#,
        )
        .bind(root.id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .unwrap();

        let mut ids = find_child_ids(&mut conn, root.id).await.unwrap();
        assert_eq!(ids.len(), 33000);
        ids.push(root.id);

        let removed = soft_delete_many(&mut conn, &ids).await.unwrap();
        assert_eq!(removed, 33001);
        assert!(find_by_id(&mut conn, root.id).await.unwrap().is_none());
        assert!(find_child_ids(&mut conn, root.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_is_a_decode_error() {
        let db = TestDb::new().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let row = sqlx::query(
            "SELECT 1 AS id, 0 AS parent_id, 'x' AS name, 'link' AS type, '' AS url, 0 AS is_private, '2025-01-01T00:00:00Z' AS created_at",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();

        assert!(matches!(document_from_row(&row), Err(AppError::Database(_))));
    }
}
