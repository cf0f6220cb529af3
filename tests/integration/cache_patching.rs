use crate::integration::support::{bytes, portal};
use futures::future::join_all;
use std::time::Duration;
use studyhub::cache::Freshness;
use studyhub::manager::FacultyEntry;
use studyhub::storage::{StorageAdapter, StorageOp};
use studyhub::{CollectionRoot, ResourceError};

fn rao() -> FacultyEntry {
    FacultyEntry {
        name: "Dr. Rao".to_string(),
        email: "rao@college.edu".to_string(),
        role: "Professor".to_string(),
        contact: "555-0101".to_string(),
    }
}

#[tokio::test]
async fn created_folder_is_listed_without_refetch() {
    let p = portal();
    p.manager.list_folders().await.unwrap();
    let calls = p.storage.calls(StorageOp::ListChildren);

    let calculus = p.manager.add_subject_folder(&p.sem3, "Calculus").await.unwrap();
    let tree = p.manager.list_folders().await.unwrap();

    let sem3 = tree.find("Sem3").unwrap();
    assert_eq!(sem3.find("Calculus").unwrap().folder.id, calculus.id);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), calls);
}

#[tokio::test]
async fn second_create_with_same_name_conflicts() {
    let p = portal();
    p.warm().await;

    p.manager.add_subject_folder(&p.sem3, "Calculus").await.unwrap();
    let err = p
        .manager
        .add_subject_folder(&p.sem3, "Calculus")
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::Conflict(_)));

    let subjects = p.manager.get_subject_list("Sem3").await.unwrap();
    assert_eq!(subjects.iter().filter(|s| s.name == "Calculus").count(), 1);
    assert_eq!(p.storage.calls(StorageOp::CreateFolder), 1);
}

#[tokio::test]
async fn provider_conflict_surfaces_when_parent_is_not_cached() {
    let p = portal();
    let err = p.manager.add_subject_folder(&p.sem3, "DSA").await.unwrap_err();
    assert!(matches!(err, ResourceError::Conflict(_)));
    assert_eq!(p.storage.calls(StorageOp::CreateFolder), 1);
}

#[tokio::test]
async fn create_under_cold_parent_shows_up_on_first_listing() {
    let p = portal();
    let os = p.manager.add_subject_folder(&p.sem3, "OS").await.unwrap();
    let subjects = p.manager.get_subject_list("Sem3").await.unwrap();
    assert!(subjects.iter().any(|s| s.id == os.id));
}

#[tokio::test]
async fn recursive_delete_leaves_no_orphans() {
    let p = portal();
    p.manager.list_folders().await.unwrap();
    p.manager
        .get_files_for_subject(&p.dsa, "notes", None)
        .await
        .unwrap();
    p.manager.upvote(&p.f1, "alice").unwrap();

    p.manager.delete_node(&p.sem3).await.unwrap();

    let tree = p.manager.list_folders().await.unwrap();
    assert!(tree.find("Sem3").is_none());
    assert!(tree.find("Sem4").is_some());
    assert!(p.manager.cache().orphans().is_empty());
    for id in [&p.sem3, &p.dsa, &p.notes, &p.f1] {
        assert!(p.manager.cache().lookup(id).is_none());
        assert!(!p.storage.contains(id));
    }
    assert!(matches!(
        p.manager.upvote(&p.f1, "alice"),
        Err(ResourceError::NotFound(_))
    ));
    assert!(matches!(
        p.manager.delete_node(&p.dsa).await,
        Err(ResourceError::NotFound(_))
    ));
}

#[tokio::test]
async fn rename_is_patched_in_place() {
    let p = portal();
    p.warm().await;
    let calls = p.storage.calls(StorageOp::ListChildren);

    let renamed = p.manager.rename_node(&p.dsa, "Algorithms").await.unwrap();
    assert_eq!(renamed.id, p.dsa);

    let names: Vec<_> = p
        .manager
        .get_subject_list("Sem3")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Algorithms"]);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), calls);
}

#[tokio::test]
async fn rename_onto_a_sibling_conflicts() {
    let p = portal();
    p.warm().await;
    p.manager.add_subject_folder(&p.sem3, "OS").await.unwrap();

    let err = p.manager.rename_node(&p.dsa, "OS").await.unwrap_err();
    assert!(matches!(err, ResourceError::Conflict(_)));
    assert_eq!(p.storage.calls(StorageOp::Rename), 0);
}

#[tokio::test]
async fn upload_is_visible_with_zero_score() {
    let p = portal();
    p.warm().await;
    let calls = p.storage.calls(StorageOp::ListChildren);

    let uploaded = p
        .manager
        .upload_file(
            &p.notes,
            "heaps.pdf",
            bytes(b"binary heap notes"),
            "application/pdf",
            Some("prof".to_string()),
        )
        .await
        .unwrap();
    let files = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", Some("prof"))
        .await
        .unwrap();

    let rated = files.iter().find(|f| f.file.id == uploaded.id).unwrap();
    assert_eq!(rated.score, 0);
    assert_eq!(rated.my_vote, None);
    assert_eq!(rated.file.uploaded_by.as_deref(), Some("prof"));
    assert_eq!(
        p.storage.file_bytes(&uploaded.id),
        Some(b"binary heap notes".to_vec())
    );
    assert_eq!(p.storage.calls(StorageOp::ListChildren), calls);
}

#[tokio::test]
async fn faculty_entries_round_trip_through_properties() {
    let p = portal();
    p.manager.list_faculty().await.unwrap();

    let photo = p
        .manager
        .add_faculty_entry(&rao(), bytes(b"png"), "image/png", None)
        .await
        .unwrap();
    let members = p.manager.list_faculty().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].entry, Some(rao()));

    let mut updated = rao();
    updated.role = "Head of Department".to_string();
    p.manager
        .update_faculty_entry(&photo.id, &updated, None)
        .await
        .unwrap();
    let members = p.manager.list_faculty().await.unwrap();
    assert_eq!(members[0].entry, Some(updated));
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 1);
}

#[tokio::test]
async fn faculty_photo_must_be_an_image() {
    let p = portal();
    let err = p
        .manager
        .add_faculty_entry(&rao(), bytes(b"%PDF"), "application/pdf", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::InvalidInput(_)));
    assert_eq!(p.storage.calls(StorageOp::PutFile), 0);
}

#[tokio::test]
async fn inconsistent_patch_invalidates_and_self_heals() {
    let p = portal();
    p.manager.list_faculty().await.unwrap();
    let photo = p
        .manager
        .add_faculty_entry(&rao(), bytes(b"png"), "image/png", None)
        .await
        .unwrap();

    // renamed behind the cache's back
    p.storage.rename(&photo.id, "rao.png").await.unwrap();

    p.manager
        .update_faculty_entry(&photo.id, &rao(), None)
        .await
        .unwrap();
    assert_eq!(
        p.manager.cache().freshness(&p.roots.faculty_directory),
        Freshness::Empty
    );

    let members = p.manager.list_faculty().await.unwrap();
    assert_eq!(members[0].photo.name, "rao.png");
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 2);
}

#[tokio::test]
async fn subject_ids_survive_force_invalidate() {
    let p = portal();
    p.warm().await;
    p.manager.force_invalidate(Some(CollectionRoot::AcademicResources));
    assert!(p.manager.cache().lookup(&p.dsa).is_none());

    let files = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", None)
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file.id, p.f1);
    assert!(p.manager.cache().orphans().is_empty());

    // the reattached path is cached again
    let calls = p.storage.calls(StorageOp::ListChildren);
    let names: Vec<_> = p
        .manager
        .get_subject_list("Sem3")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["DSA"]);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), calls);
}

#[tokio::test]
async fn cold_manager_serves_a_known_subject_id() {
    let p = portal();
    let files = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", Some("alice"))
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file.name, "F1");
    // DSA and Sem3 looked up, then root, Sem3, DSA and notes listed
    assert_eq!(p.storage.calls(StorageOp::GetNode), 2);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), 4);
}

#[tokio::test]
async fn invalidated_semester_is_reattached_on_next_subject_read() {
    let p = portal();
    p.warm().await;
    p.storage.rename(&p.f1, "F1 (revised)").await.unwrap();
    // what a failed patch under Sem3 does to the cache
    assert!(p.manager.cache().invalidate(&p.sem3));
    assert!(p.manager.cache().lookup(&p.notes).is_none());

    let names: Vec<_> = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", None)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.file.name)
        .collect();
    assert_eq!(names, vec!["F1 (revised)"]);
    assert_eq!(p.storage.calls(StorageOp::GetNode), 1);
}

#[tokio::test]
async fn subject_ids_outside_academic_resources_are_not_found() {
    let p = portal();
    let err = p
        .manager
        .get_files_for_subject(&p.roots.timetables, "notes", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));

    p.storage.delete(&p.dsa).await.unwrap();
    let err = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timetable_upsert_is_never_observed_half_applied() {
    let p = portal();
    p.manager
        .upload_timetable("week.pdf", bytes(b"v0"), "application/pdf", None)
        .await
        .unwrap();
    p.manager.list_timetables().await.unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = p.manager.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..200 {
                    seen.push(manager.list_timetables().await.unwrap().len());
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();
    for version in 1..=20u8 {
        p.manager
            .upload_timetable("week.pdf", bytes(&[version]), "application/pdf", None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    for joined in join_all(readers).await {
        assert!(joined.unwrap().iter().all(|&len| len == 1));
    }
}
