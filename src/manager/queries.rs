//! Read operations of the resource manager. All of them are served from the
//! hierarchy cache, which lists a folder from the provider only on a miss.

use super::faculty::FacultyEntry;
use super::ResourceManager;
use crate::error::ResourceError;
use crate::tree::{FolderTree, Node};
use crate::types::{category, CollectionRoot, NodeId};
use crate::votes::VoteDirection;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;

/// A file with its vote score and the requester's own vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatedFile {
    pub file: Node,
    pub score: i64,
    pub my_vote: Option<VoteDirection>,
}

/// Files of one subject's category folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectFiles {
    pub subject: Node,
    pub files: Vec<RatedFile>,
}

/// A faculty photo and the entry stored on it. `entry` is None for files
/// that were placed in the directory without faculty fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacultyMember {
    pub photo: Node,
    pub entry: Option<FacultyEntry>,
}

impl ResourceManager {
    fn root_node(&self, root: CollectionRoot) -> Result<Node, ResourceError> {
        self.cache
            .lookup(self.cache.root_id(root))
            .ok_or_else(|| ResourceError::NotFound(format!("collection {}", root)))
    }

    async fn root_children(&self, root: CollectionRoot) -> Result<Vec<Node>, ResourceError> {
        self.cache.get_children(root, self.cache.root_id(root)).await
    }

    /// Folder hierarchy of Academic Resources, every level loaded
    pub async fn list_folders(&self) -> Result<FolderTree, ResourceError> {
        let root = CollectionRoot::AcademicResources;
        let tree = self.folder_tree(root, self.root_node(root)?).await?;
        Ok(tree.unwrap_or_else(|| FolderTree {
            folder: Node::folder(self.cache.root_id(root).clone(), root.display_name(), None),
            children: Vec::new(),
        }))
    }

    /// Subfolders are listed concurrently. A folder that vanished upstream
    /// mid-walk yields None and is left out of its parent's children.
    fn folder_tree(
        &self,
        root: CollectionRoot,
        folder: Node,
    ) -> BoxFuture<'_, Result<Option<FolderTree>, ResourceError>> {
        async move {
            let children = match self.cache.get_children(root, &folder.id).await {
                Ok(children) => children,
                Err(ResourceError::NotFound(_)) if folder.parent_id.is_some() => return Ok(None),
                Err(err) => return Err(err),
            };
            let subtrees = try_join_all(
                children
                    .into_iter()
                    .filter(Node::is_folder)
                    .map(|child| self.folder_tree(root, child)),
            )
            .await?;
            Ok(Some(FolderTree {
                folder,
                children: subtrees.into_iter().flatten().collect(),
            }))
        }
        .boxed()
    }

    /// Class schedule files
    pub async fn list_schedule(&self) -> Result<Vec<Node>, ResourceError> {
        self.root_children(CollectionRoot::Schedules).await
    }

    pub async fn list_faculty(&self) -> Result<Vec<FacultyMember>, ResourceError> {
        Ok(self
            .root_children(CollectionRoot::FacultyDirectory)
            .await?
            .into_iter()
            .filter(Node::is_file)
            .map(|photo| FacultyMember {
                entry: FacultyEntry::from_node(&photo),
                photo,
            })
            .collect())
    }

    pub async fn list_timetables(&self) -> Result<Vec<Node>, ResourceError> {
        self.root_children(CollectionRoot::Timetables).await
    }

    /// Semester folders in provider order
    pub async fn get_semester_list(&self) -> Result<Vec<Node>, ResourceError> {
        Ok(self
            .root_children(CollectionRoot::AcademicResources)
            .await?
            .into_iter()
            .filter(Node::is_folder)
            .collect())
    }

    /// Subject folders of the named semester
    pub async fn get_subject_list(&self, semester_name: &str) -> Result<Vec<Node>, ResourceError> {
        let root = CollectionRoot::AcademicResources;
        let semester = self.cache.resolve_path(root, &[semester_name]).await?;
        if !semester.is_folder() {
            return Err(ResourceError::NotFound(format!(
                "semester '{}'",
                semester_name
            )));
        }
        Ok(self
            .cache
            .get_children(root, &semester.id)
            .await?
            .into_iter()
            .filter(Node::is_folder)
            .collect())
    }

    /// Files in one category folder of a subject, with vote scores.
    ///
    /// `requester` only fills in `my_vote`; it is not checked here.
    pub async fn get_files_for_subject(
        &self,
        subject_id: &NodeId,
        category: &str,
        requester: Option<&str>,
    ) -> Result<Vec<RatedFile>, ResourceError> {
        let root = CollectionRoot::AcademicResources;
        let category_folder = self
            .cache
            .get_children(root, subject_id)
            .await?
            .into_iter()
            .find(|n| n.is_folder() && n.name == category)
            .ok_or_else(|| {
                ResourceError::NotFound(format!("category '{}' under {}", category, subject_id))
            })?;
        let files = self.cache.get_children(root, &category_folder.id).await?;
        self.rate(files, requester)
    }

    /// Previous-year papers of every subject in a semester. Subjects without a
    /// papers folder are skipped.
    pub async fn get_pyqs(
        &self,
        semester_name: &str,
        requester: Option<&str>,
    ) -> Result<Vec<SubjectFiles>, ResourceError> {
        let subjects = self.get_subject_list(semester_name).await?;
        let per_subject = try_join_all(subjects.into_iter().map(|subject| async move {
            match self
                .get_files_for_subject(&subject.id, category::PYQS, requester)
                .await
            {
                Ok(files) => Ok(Some(SubjectFiles { subject, files })),
                Err(ResourceError::NotFound(_)) => Ok(None),
                Err(err) => Err(err),
            }
        }))
        .await?;
        Ok(per_subject.into_iter().flatten().collect())
    }

    /// Cached records for the given ids, in request order. Unknown and
    /// deleted ids are left out; the provider is never contacted.
    pub fn get_files_metadata(&self, ids: &[NodeId]) -> Vec<Node> {
        ids.iter().filter_map(|id| self.cache.lookup(id)).collect()
    }

    fn rate(&self, nodes: Vec<Node>, requester: Option<&str>) -> Result<Vec<RatedFile>, ResourceError> {
        nodes
            .into_iter()
            .filter(Node::is_file)
            .map(|file| {
                let record = self.votes.record(&file.id)?;
                Ok(RatedFile {
                    score: record.score(),
                    my_vote: requester.and_then(|who| record.direction_of(who)),
                    file,
                })
            })
            .collect()
    }
}
