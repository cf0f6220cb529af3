use crate::integration::support::{bytes, portal};
use studyhub::storage::StorageOp;
use studyhub::CollectionRoot;

#[tokio::test]
async fn replace_a_deleted_file_with_a_new_upload() {
    let p = portal();
    let dsa = p
        .manager
        .cache()
        .resolve_path(CollectionRoot::AcademicResources, &["Sem3", "DSA"])
        .await
        .unwrap();
    let before = p
        .manager
        .get_files_for_subject(&dsa.id, "notes", None)
        .await
        .unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].file.name, "F1");
    let listings = p.storage.calls(StorageOp::ListChildren);

    p.manager.delete_node(&p.f1).await.unwrap();
    let f1b = p
        .manager
        .upload_file(
            &p.notes,
            "F1b",
            bytes(b"second edition"),
            "application/pdf",
            None,
        )
        .await
        .unwrap();

    let after = p
        .manager
        .get_files_for_subject(&dsa.id, "notes", None)
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].file.name, "F1b");
    assert_eq!(after[0].file.id, f1b.id);
    assert_ne!(after[0].file.id, p.f1);
    assert_eq!(p.storage.calls(StorageOp::ListChildren), listings);

    let mut downloaded = Vec::new();
    p.manager
        .stream_file_download(&f1b.id, &mut downloaded)
        .await
        .unwrap();
    assert_eq!(downloaded, b"second edition");
}

#[tokio::test]
async fn semester_browsing_end_to_end() {
    let p = portal();
    let semesters: Vec<_> = p
        .manager
        .get_semester_list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(semesters, vec!["Sem3", "Sem4"]);

    let os = p.manager.add_subject_folder(&p.sem3, "OS").await.unwrap();
    let papers = p.manager.add_subject_folder(&os.id, "pyqs").await.unwrap();
    p.manager
        .upload_file(&papers.id, "2023.pdf", bytes(b"q1"), "application/pdf", None)
        .await
        .unwrap();

    let grouped = p.manager.get_pyqs("Sem3", Some("alice")).await.unwrap();
    let subjects: Vec<_> = grouped.iter().map(|g| g.subject.name.as_str()).collect();
    assert_eq!(subjects, vec!["DSA", "OS"]);
    assert!(grouped[0].files.is_empty());
    assert_eq!(grouped[1].files[0].file.name, "2023.pdf");
}
