use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use studyhub::config::CollectionRoots;
use studyhub::storage::{ByteStream, InMemoryStorage};
use studyhub::votes::MemoryVoteStore;
use studyhub::{NodeId, ResourceManager};

/// Provider seeded with `Academic Resources/Sem3/DSA/notes/F1`
pub struct Portal {
    pub storage: Arc<InMemoryStorage>,
    pub manager: Arc<ResourceManager>,
    pub roots: CollectionRoots,
    pub sem3: NodeId,
    pub dsa: NodeId,
    pub notes: NodeId,
    pub f1: NodeId,
}

pub fn portal() -> Portal {
    portal_with_deadline(Duration::from_secs(5))
}

pub fn portal_with_deadline(deadline: Duration) -> Portal {
    let storage = Arc::new(InMemoryStorage::with_chunk_size(8));
    let roots = CollectionRoots {
        academic_resources: storage.create_root("Academic Resources"),
        faculty_directory: storage.create_root("Faculty Directory"),
        schedules: storage.create_root("Schedules"),
        timetables: storage.create_root("Timetables"),
    };
    let sem3 = storage.seed_folder(&roots.academic_resources, "Sem3").unwrap();
    storage.seed_folder(&roots.academic_resources, "Sem4").unwrap();
    let dsa = storage.seed_folder(&sem3, "DSA").unwrap();
    let notes = storage.seed_folder(&dsa, "notes").unwrap();
    storage.seed_folder(&dsa, "pyqs").unwrap();
    let f1 = storage
        .seed_file(&notes, "F1", b"first edition".to_vec(), "application/pdf")
        .unwrap();

    let manager = Arc::new(
        ResourceManager::new(
            storage.clone(),
            roots.clone(),
            Arc::new(MemoryVoteStore::new()),
            deadline,
        )
        .unwrap(),
    );
    Portal {
        storage,
        manager,
        roots,
        sem3,
        dsa,
        notes,
        f1,
    }
}

impl Portal {
    /// Load Sem3 and DSA into the cache
    pub async fn warm(&self) {
        self.manager.get_subject_list("Sem3").await.unwrap();
        self.manager
            .get_files_for_subject(&self.dsa, "notes", None)
            .await
            .unwrap();
    }
}

pub fn bytes(data: &[u8]) -> ByteStream {
    let chunks: Vec<std::io::Result<Vec<u8>>> =
        data.chunks(3).map(|c| Ok(c.to_vec())).collect();
    stream::iter(chunks).boxed()
}
