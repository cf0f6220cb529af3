use crate::integration::support::portal;
use futures::future::join_all;
use std::sync::Arc;
use studyhub::votes::{SledVoteStore, VoteDirection, VoteLedger};
use studyhub::NodeId;
use tempfile::TempDir;

#[tokio::test]
async fn scores_follow_direction_switches() {
    let p = portal();
    p.warm().await;

    assert_eq!(p.manager.upvote(&p.f1, "alice").unwrap(), 1);
    assert_eq!(p.manager.upvote(&p.f1, "bob").unwrap(), 2);
    assert_eq!(p.manager.downvote(&p.f1, "alice").unwrap(), 0);
    assert_eq!(p.manager.remove_upvote(&p.f1, "alice").unwrap(), 0);
    assert_eq!(p.manager.remove_downvote(&p.f1, "alice").unwrap(), 1);

    let files = p
        .manager
        .get_files_for_subject(&p.dsa, "notes", Some("bob"))
        .await
        .unwrap();
    assert_eq!(files[0].score, 1);
    assert_eq!(files[0].my_vote, Some(VoteDirection::Up));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_voters_on_one_file_lose_nothing() {
    let p = portal();
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let manager = p.manager.clone();
            let file = p.f1.clone();
            tokio::spawn(async move {
                let who = format!("student-{}", i);
                if i % 4 == 0 {
                    manager.downvote(&file, &who)
                } else {
                    manager.upvote(&file, &who)
                }
            })
        })
        .collect();
    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let record = p.manager.votes().record(&p.f1).unwrap();
    assert_eq!(record.upvoters().len(), 24);
    assert_eq!(record.downvoters().len(), 8);
    assert_eq!(p.manager.votes().score(&p.f1).unwrap(), 16);
}

#[test]
fn sled_votes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let file = NodeId::from("node-000042");
    {
        let store = Arc::new(SledVoteStore::open(dir.path()).unwrap());
        let ledger = VoteLedger::new(store.clone());
        ledger.upvote(&file, "alice").unwrap();
        ledger.downvote(&file, "bob").unwrap();
        ledger.upvote(&file, "carol").unwrap();
        store.flush().unwrap();
    }

    let ledger = VoteLedger::new(Arc::new(SledVoteStore::open(dir.path()).unwrap()));
    assert_eq!(ledger.score(&file).unwrap(), 1);
    assert_eq!(
        ledger.vote_of(&file, "bob").unwrap(),
        Some(VoteDirection::Down)
    );
}
