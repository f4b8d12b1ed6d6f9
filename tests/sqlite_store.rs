//! SQLite vector-store behavior on scratch databases.

use tempfile::TempDir;
use uuid::Uuid;

use recall::filter::{Condition, Filter};
use recall::models::{point_id, ContentPayload, DocumentMetadata, NodeType, VectorPoint};
use recall::store::sqlite::SqliteVectorStore;
use recall::store::VectorStore;

fn payload(tenant: &str, seq: u32, content: &str) -> ContentPayload {
    ContentPayload {
        tenant_id: tenant.into(),
        sequence: seq,
        content: content.into(),
        metadata: DocumentMetadata {
            node_type: NodeType::Note,
            note_id: Some("n1".into()),
            ..Default::default()
        },
    }
}

fn point(doc: &str, seq: u32, tenant: &str, vector: Vec<f32>) -> VectorPoint {
    VectorPoint {
        id: point_id(doc, seq),
        vector,
        payload: payload(tenant, seq, &format!("{doc} chunk {seq}")),
    }
}

async fn scratch_store(dims: usize) -> (TempDir, SqliteVectorStore) {
    let tmp = TempDir::new().unwrap();
    let store = SqliteVectorStore::open(&tmp.path().join("recall.sqlite"), dims)
        .await
        .unwrap();
    (tmp, store)
}

#[tokio::test]
async fn test_open_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("recall.sqlite");
    let first = SqliteVectorStore::open(&path, 2).await.unwrap();
    first
        .upsert(vec![point("d1", 0, "u1", vec![1.0, 0.0])])
        .await
        .unwrap();
    drop(first);

    // Reopening must keep existing data intact.
    let second = SqliteVectorStore::open(&path, 2).await.unwrap();
    let hits = second
        .search(&[1.0, 0.0], &Filter::new(), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_upsert_search_roundtrip() {
    let (_tmp, store) = scratch_store(3).await;
    store
        .upsert(vec![
            point("d1", 0, "u1", vec![1.0, 0.0, 0.0]),
            point("d1", 1, "u1", vec![0.0, 1.0, 0.0]),
        ])
        .await
        .unwrap();

    let hits = store
        .search(
            &[1.0, 0.0, 0.0],
            &Filter::new().and(Condition::matches("tenantId", "u1")),
            10,
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].point.payload.sequence, 0);
    assert!(hits[0].score > hits[1].score);
    assert_eq!(hits[0].point.id, point_id("d1", 0));
}

#[tokio::test]
async fn test_upsert_replaces_existing_id() {
    let (_tmp, store) = scratch_store(2).await;
    store
        .upsert(vec![point("d1", 0, "u1", vec![1.0, 0.0])])
        .await
        .unwrap();

    let mut updated = point("d1", 0, "u1", vec![0.0, 1.0]);
    updated.payload.content = "updated".into();
    store.upsert(vec![updated]).await.unwrap();

    let hits = store
        .search(&[0.0, 1.0], &Filter::new(), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].point.payload.content, "updated");
}

#[tokio::test]
async fn test_delete_by_filter_is_scoped() {
    let (_tmp, store) = scratch_store(2).await;
    store
        .upsert(vec![
            point("d1", 0, "u1", vec![1.0, 0.0]),
            point("d2", 0, "u2", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

    store
        .delete(&Filter::new().and(Condition::matches("tenantId", "u1")))
        .await
        .unwrap();

    let remaining = store
        .search(&[1.0, 0.0], &Filter::new(), 10)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].point.payload.tenant_id, "u2");
}

#[tokio::test]
async fn test_any_of_filter() {
    let (_tmp, store) = scratch_store(2).await;
    let mut a = point("d1", 0, "u1", vec![1.0, 0.0]);
    a.payload.metadata.note_id = Some("n1".into());
    let mut b = point("d2", 0, "u1", vec![1.0, 0.0]);
    b.payload.metadata.note_id = Some("n2".into());
    let mut c = point("d3", 0, "u1", vec![1.0, 0.0]);
    c.payload.metadata.note_id = Some("n3".into());
    store.upsert(vec![a, b, c]).await.unwrap();

    let filter = Filter::new()
        .and(Condition::matches("tenantId", "u1"))
        .and(Condition::any_of(
            "noteId",
            vec!["n1".into(), "n3".into()],
        ));
    let hits = store.search(&[1.0, 0.0], &filter, 10).await.unwrap();
    let mut note_ids: Vec<String> = hits
        .iter()
        .filter_map(|h| h.point.payload.metadata.note_id.clone())
        .collect();
    note_ids.sort();
    assert_eq!(note_ids, vec!["n1", "n3"]);
}

#[tokio::test]
async fn test_dimension_mismatch_rejected() {
    let (_tmp, store) = scratch_store(2).await;
    let err = store
        .upsert(vec![point("d1", 0, "u1", vec![1.0, 0.0, 0.0])])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        recall::error::StoreError::DimensionMismatch { .. }
    ));
}

#[tokio::test]
async fn test_top_k_truncates() {
    let (_tmp, store) = scratch_store(2).await;
    let points: Vec<VectorPoint> = (0..20)
        .map(|i| point("d1", i, "u1", vec![1.0, i as f32 / 20.0]))
        .collect();
    store.upsert(points).await.unwrap();

    let hits = store
        .search(&[1.0, 0.0], &Filter::new(), 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 5);
}

#[tokio::test]
async fn test_ids_survive_roundtrip_as_uuids() {
    let (_tmp, store) = scratch_store(2).await;
    let original = point("d1", 7, "u1", vec![0.5, 0.5]);
    let id: Uuid = original.id;
    store.upsert(vec![original]).await.unwrap();

    let hits = store
        .search(&[0.5, 0.5], &Filter::new(), 1)
        .await
        .unwrap();
    assert_eq!(hits[0].point.id, id);
}
