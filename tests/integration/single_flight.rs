use crate::integration::support::portal;
use futures::future::join_all;
use std::time::Duration;
use studyhub::cache::Freshness;
use studyhub::storage::StorageOp;
use studyhub::{CollectionRoot, ResourceError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_listing() {
    let p = portal();
    p.storage.set_latency(Some(Duration::from_millis(50)));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = p.manager.clone();
            tokio::spawn(async move { manager.get_semester_list().await })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(p.storage.calls(StorageOp::ListChildren), 1);
    assert!(results.iter().all(|r| r == &results[0]));
    let names: Vec<_> = results[0].iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Sem3", "Sem4"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_share_a_failure_and_a_later_call_retries() {
    let p = portal();
    p.storage.set_latency(Some(Duration::from_millis(50)));
    p.storage.fail_next(StorageOp::ListChildren);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = p.manager.clone();
            tokio::spawn(async move { manager.get_semester_list().await })
        })
        .collect();
    for joined in join_all(handles).await {
        assert!(matches!(
            joined.unwrap(),
            Err(ResourceError::ProviderUnavailable(_))
        ));
    }
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 1);
    assert_eq!(
        p.manager.cache().freshness(&p.roots.academic_resources),
        Freshness::Empty
    );

    let semesters = p.manager.get_semester_list().await.unwrap();
    assert_eq!(semesters.len(), 2);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalidation_during_a_listing_discards_its_result() {
    let p = portal();
    p.storage.set_latency(Some(Duration::from_millis(100)));

    let manager = p.manager.clone();
    let in_flight = tokio::spawn(async move { manager.get_semester_list().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        p.manager.cache().freshness(&p.roots.academic_resources),
        Freshness::Loading
    );
    p.manager.force_invalidate(Some(CollectionRoot::AcademicResources));

    // the caller still gets the provider's answer
    assert_eq!(in_flight.await.unwrap().unwrap().len(), 2);
    assert_eq!(
        p.manager.cache().freshness(&p.roots.academic_resources),
        Freshness::Empty
    );

    p.storage.set_latency(None);
    p.manager.get_semester_list().await.unwrap();
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 2);
    assert_eq!(
        p.manager.cache().freshness(&p.roots.academic_resources),
        Freshness::Fresh
    );
}

#[tokio::test]
async fn cache_hits_do_not_reach_the_provider() {
    let p = portal();
    p.manager.list_folders().await.unwrap();
    let calls = p.storage.calls(StorageOp::ListChildren);

    for _ in 0..5 {
        p.manager.get_subject_list("Sem3").await.unwrap();
        p.manager.list_folders().await.unwrap();
        p.manager
            .get_files_for_subject(&p.dsa, "notes", None)
            .await
            .unwrap();
    }
    assert_eq!(p.storage.calls(StorageOp::ListChildren), calls);
    assert_eq!(p.storage.calls(StorageOp::GetNode), 0);
}

#[tokio::test]
async fn failed_listings_are_not_cached() {
    let p = portal();
    p.storage.set_failing(StorageOp::ListChildren, true);
    for _ in 0..3 {
        assert!(matches!(
            p.manager.get_semester_list().await,
            Err(ResourceError::ProviderUnavailable(_))
        ));
    }
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 3);

    p.storage.set_failing(StorageOp::ListChildren, false);
    assert_eq!(p.manager.get_semester_list().await.unwrap().len(), 2);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 4);
}
