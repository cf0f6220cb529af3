use crate::integration::support::{bytes, portal, portal_with_deadline};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use studyhub::cache::Freshness;
use studyhub::storage::{StorageAdapter, StorageOp};
use studyhub::ResourceError;
use tokio::io::AsyncWrite;

/// Sink whose reader went away
struct ClosedSink;

impl AsyncWrite for ClosedSink {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "client hung up")))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn failed_upload_leaves_cache_untouched() {
    let p = portal();
    p.warm().await;
    p.storage.fail_next(StorageOp::PutFile);

    let err = p
        .manager
        .upload_file(&p.notes, "F2", bytes(b"x"), "application/pdf", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::ProviderUnavailable(_)));
    assert!(p.manager.cache().cached_child(&p.notes, "F2").is_none());

    // nothing landed upstream, so a retry is a plain create
    p.manager
        .upload_file(&p.notes, "F2", bytes(b"x"), "application/pdf", None)
        .await
        .unwrap();
    assert!(p.manager.cache().cached_child(&p.notes, "F2").is_some());
}

#[tokio::test]
async fn write_timeout_is_provider_unavailable_and_not_applied() {
    let p = portal_with_deadline(Duration::from_millis(50));
    p.warm().await;
    p.storage.set_latency(Some(Duration::from_millis(300)));

    let err = p
        .manager
        .add_subject_folder(&p.sem3, "Calculus")
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::ProviderUnavailable(_)));
    assert!(p.manager.cache().cached_child(&p.sem3, "Calculus").is_none());

    p.storage.set_latency(None);
    p.manager.add_subject_folder(&p.sem3, "Calculus").await.unwrap();
}

#[tokio::test]
async fn read_timeout_reverts_folder_to_empty() {
    let p = portal_with_deadline(Duration::from_millis(50));
    p.storage.set_latency(Some(Duration::from_millis(300)));

    let err = p.manager.get_semester_list().await.unwrap_err();
    assert!(matches!(err, ResourceError::ProviderUnavailable(_)));
    assert_eq!(
        p.manager.cache().freshness(&p.roots.academic_resources),
        Freshness::Empty
    );

    p.storage.set_latency(None);
    assert_eq!(p.manager.get_semester_list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn folder_removed_upstream_drops_out_of_the_cache() {
    let p = portal();
    p.manager.get_semester_list().await.unwrap();
    p.storage.delete(&p.sem3).await.unwrap();

    let err = p.manager.get_subject_list("Sem3").await.unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));

    let calls = p.storage.calls(StorageOp::ListChildren);
    let names: Vec<_> = p
        .manager
        .get_semester_list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Sem4"]);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), calls);
    assert!(p.manager.cache().orphans().is_empty());
}

#[tokio::test]
async fn deleting_a_node_already_gone_upstream_still_clears_the_cache() {
    let p = portal();
    p.warm().await;
    p.storage.delete(&p.f1).await.unwrap();

    let err = p.manager.delete_node(&p.f1).await.unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));
    let files = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", None)
        .await
        .unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn download_failures_map_to_the_closed_set() {
    let p = portal();
    let mut sink = ClosedSink;
    let err = p
        .manager
        .stream_file_download(&p.f1, &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::SinkClosed(_)));

    let mut buffer = Vec::new();
    let err = p
        .manager
        .stream_file_download(&studyhub::NodeId::from("node-999999"), &mut buffer)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));
    assert!(buffer.is_empty());

    p.storage.fail_next(StorageOp::ReadFile);
    let err = p
        .manager
        .stream_file_download(&p.f1, &mut buffer)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::ProviderUnavailable(_)));
}
