//! Document library: directory tree maintenance.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool};

use crate::db::{self, documents};
use crate::errors::{not_found, AppError, ResultExt};
use crate::models::{
    DocumentNode, DocumentType, NewDocument, UpdateDocumentRequest, UploadedFile, ROOT_PARENT_ID,
};

use super::EvidenceUploader;

pub struct DocumentService {
    pool: SqlitePool,
    uploader: Arc<dyn EvidenceUploader>,
}

impl DocumentService {
    pub fn new(pool: SqlitePool, uploader: Arc<dyn EvidenceUploader>) -> Self {
        Self { pool, uploader }
    }

    /// Add a directory, or a file with its uploaded content, under `parent_id`.
    pub async fn create_document(
        &self,
        document: NewDocument,
        file: Option<UploadedFile>,
    ) -> Result<DocumentNode, AppError> {
        let name = validate_name(&document.name)?;
        let file = match (document.doc_type, file) {
            (DocumentType::File, Some(file)) if !file.is_empty() => Some(file),
            (DocumentType::File, _) => return Err(AppError::validation("file is required")),
            (DocumentType::Dir, Some(_)) => {
                return Err(AppError::validation("a directory cannot carry a file"))
            }
            (DocumentType::Dir, None) => None,
        };

        // The parent check and the insert share the write lock, so a concurrent
        // subtree removal cannot delete the parent in between.
        let mut tx = db::begin_write(&self.pool).await?;

        if document.parent_id != ROOT_PARENT_ID {
            let parent = documents::find_by_id(&mut *tx, document.parent_id)
                .await?
                .ok_or_else(|| AppError::not_found(not_found::DOCUMENT))?;
            if parent.doc_type != DocumentType::Dir {
                return Err(AppError::validation("parent must be a directory"));
            }
        }

        let is_private =
            document.is_private || has_private_ancestor(&mut *tx, document.parent_id).await?;

        let url = match &file {
            Some(file) => self.uploader.upload(&file.filename, &file.bytes).await?,
            None => String::new(),
        };

        let node = documents::insert(
            &mut *tx,
            &NewDocument {
                name,
                is_private,
                ..document
            },
            &url,
        )
        .await?
        .ok_or_else(|| AppError::not_found(not_found::DOCUMENT))?;

        tx.commit().await.context("commit document")?;

        tracing::info!(
            "Created {} {} under {} (private={})",
            node.doc_type.as_str(),
            node.id,
            node.parent_id,
            node.is_private
        );
        Ok(node)
    }

    pub async fn edit_document(
        &self,
        id: i64,
        request: UpdateDocumentRequest,
    ) -> Result<DocumentNode, AppError> {
        let mut tx = db::begin_write(&self.pool).await?;

        let existing = documents::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::DOCUMENT))?;

        let name = match &request.name {
            Some(name) => validate_name(name)?,
            None => existing.name.clone(),
        };
        let is_private = request.is_private.unwrap_or(existing.is_private)
            || has_private_ancestor(&mut *tx, existing.parent_id).await?;

        let node = documents::update(&mut *tx, id, &name, is_private)
            .await?
            .ok_or_else(|| AppError::not_found(not_found::DOCUMENT))?;

        tx.commit().await.context("commit document update")?;

        tracing::info!("Updated document {}", id);
        Ok(node)
    }

    /// Soft-delete a node and everything below it. Returns how many nodes were removed.
    pub async fn remove_document(&self, id: i64) -> Result<usize, AppError> {
        let mut tx = db::begin_write(&self.pool).await?;

        if documents::find_by_id(&mut *tx, id).await?.is_none() {
            return Err(AppError::not_found(not_found::DOCUMENT));
        }

        let subtree = collect_subtree(&mut *tx, id).await?;
        documents::soft_delete_many(&mut *tx, &subtree).await?;

        tx.commit().await.context("commit document removal")?;

        tracing::info!("Removed document {} with {} descendants", id, subtree.len() - 1);
        Ok(subtree.len())
    }

    pub async fn list_documents(
        &self,
        parent_id: i64,
        include_private: bool,
    ) -> Result<Vec<DocumentNode>, AppError> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        documents::list_children(&mut *conn, parent_id, include_private).await
    }
}

/// Breadth-first walk from `root`, returning `root` and every live descendant
/// exactly once, in discovery order.
async fn collect_subtree(conn: &mut SqliteConnection, root: i64) -> Result<Vec<i64>, AppError> {
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut found = vec![root];

    while let Some(current) = queue.pop_front() {
        for child in documents::find_child_ids(conn, current).await? {
            if visited.insert(child) {
                queue.push_back(child);
                found.push(child);
            }
        }
    }

    Ok(found)
}

/// Whether any ancestor starting at `parent_id` is private.
async fn has_private_ancestor(conn: &mut SqliteConnection, parent_id: i64) -> Result<bool, AppError> {
    let mut seen = HashSet::new();
    let mut current = parent_id;

    while current != ROOT_PARENT_ID && seen.insert(current) {
        match documents::find_by_id(conn, current).await? {
            Some(node) if node.is_private => return Ok(true),
            Some(node) => current = node.parent_id,
            None => break,
        }
    }

    Ok(false)
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if name.chars().count() > 255 {
        return Err(AppError::validation("name must be at most 255 characters"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{evidence, MemoryUploader, TestDb};

    fn service(db: &TestDb) -> DocumentService {
        DocumentService::new(db.pool.clone(), Arc::new(MemoryUploader::default()))
    }

    async fn dir(service: &DocumentService, parent_id: i64, name: &str, is_private: bool) -> DocumentNode {
        service
            .create_document(
                NewDocument {
                    parent_id,
                    name: name.to_string(),
                    doc_type: DocumentType::Dir,
                    is_private,
                },
                None,
            )
            .await
            .unwrap()
    }

    async fn file(service: &DocumentService, parent_id: i64, name: &str) -> DocumentNode {
        service
            .create_document(
                NewDocument {
                    parent_id,
                    name: name.to_string(),
                    doc_type: DocumentType::File,
                    is_private: false,
                },
                Some(evidence(name)),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_remove_directory_removes_only_its_subtree() {
        let db = TestDb::new().await;
        let service = service(&db);
        let a = dir(&service, ROOT_PARENT_ID, "A", false).await;
        let b = dir(&service, a.id, "B", false).await;
        let c = file(&service, b.id, "C.pdf").await;
        let d = dir(&service, ROOT_PARENT_ID, "D", false).await;

        let removed = service.remove_document(b.id).await.unwrap();
        assert_eq!(removed, 2);

        let mut conn = db.pool.acquire().await.unwrap();
        assert!(documents::find_by_id(&mut conn, b.id).await.unwrap().is_none());
        assert!(documents::find_by_id(&mut conn, c.id).await.unwrap().is_none());
        assert!(documents::find_by_id(&mut conn, a.id).await.unwrap().is_some());
        assert!(documents::find_by_id(&mut conn, d.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_collect_subtree_on_wide_and_deep_tree() {
        let db = TestDb::new().await;
        let service = service(&db);
        let root = dir(&service, ROOT_PARENT_ID, "root", false).await;
        let mut expected = vec![root.id];

        let mut parent = root.id;
        for depth in 0..5 {
            let next = dir(&service, parent, &format!("level-{}", depth), false).await;
            expected.push(next.id);
            for n in 0..3 {
                expected.push(file(&service, next.id, &format!("f{}-{}.txt", depth, n)).await.id);
            }
            parent = next.id;
        }
        let outside = dir(&service, ROOT_PARENT_ID, "outside", false).await;

        let mut conn = db.pool.acquire().await.unwrap();
        let mut collected = collect_subtree(&mut conn, root.id).await.unwrap();
        drop(conn);
        assert_eq!(collected[0], root.id);
        collected.sort();
        expected.sort();
        assert_eq!(collected, expected);

        let removed = service.remove_document(root.id).await.unwrap();
        assert_eq!(removed, expected.len());
        let remaining = service.list_documents(ROOT_PARENT_ID, true).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, outside.id);
    }

    #[tokio::test]
    async fn test_remove_missing_document() {
        let db = TestDb::new().await;
        let service = service(&db);
        let a = dir(&service, ROOT_PARENT_ID, "A", false).await;

        assert!(matches!(service.remove_document(404).await, Err(AppError::NotFound(_))));
        service.remove_document(a.id).await.unwrap();
        assert!(matches!(service.remove_document(a.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_privacy_is_inherited_from_ancestors() {
        let db = TestDb::new().await;
        let service = service(&db);
        let secret = dir(&service, ROOT_PARENT_ID, "Board", true).await;
        let minutes = dir(&service, secret.id, "Minutes", false).await;
        let report = file(&service, minutes.id, "report.pdf").await;
        let public = dir(&service, ROOT_PARENT_ID, "Public", false).await;

        assert!(minutes.is_private);
        assert!(report.is_private);
        assert!(!public.is_private);

        // Cannot be made public while an ancestor is private.
        let edited = service
            .edit_document(
                report.id,
                UpdateDocumentRequest {
                    name: Some("annual-report.pdf".to_string()),
                    is_private: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(edited.is_private);
        assert_eq!(edited.name, "annual-report.pdf");

        let visible = service.list_documents(ROOT_PARENT_ID, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, public.id);
    }

    #[tokio::test]
    async fn test_create_document_validation() {
        let db = TestDb::new().await;
        let service = service(&db);
        let report = file(&service, ROOT_PARENT_ID, "report.pdf").await;
        assert!(report.url.starts_with("memory://"));

        let under_file = service
            .create_document(
                NewDocument {
                    parent_id: report.id,
                    name: "nested".to_string(),
                    doc_type: DocumentType::Dir,
                    is_private: false,
                },
                None,
            )
            .await;
        assert!(matches!(under_file, Err(AppError::Validation(_))));

        let missing_parent = service
            .create_document(
                NewDocument {
                    parent_id: 999,
                    name: "orphan".to_string(),
                    doc_type: DocumentType::Dir,
                    is_private: false,
                },
                None,
            )
            .await;
        assert!(matches!(missing_parent, Err(AppError::NotFound(_))));

        let no_file = service
            .create_document(
                NewDocument {
                    parent_id: ROOT_PARENT_ID,
                    name: "empty.pdf".to_string(),
                    doc_type: DocumentType::File,
                    is_private: false,
                },
                None,
            )
            .await;
        assert!(matches!(no_file, Err(AppError::Validation(_))));

        let blank_name = service
            .create_document(
                NewDocument {
                    parent_id: ROOT_PARENT_ID,
                    name: "   ".to_string(),
                    doc_type: DocumentType::Dir,
                    is_private: false,
                },
                None,
            )
            .await;
        assert!(matches!(blank_name, Err(AppError::Validation(_))));
    }
}
