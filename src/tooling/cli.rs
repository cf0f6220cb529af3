//! CLI Tooling
//!
//! Read-only inspector: mirrors a local directory into the in-memory provider
//! and runs facade queries against it. Each top-level directory named after a
//! collection (`academic-resources`, `faculty-directory`, `schedules`,
//! `timetables`) becomes that collection's root.

use crate::config::{CollectionRoots, ConfigLoader, PortalConfig};
use crate::error::{ResourceError, StartupError};
use crate::manager::{FacultyMember, RatedFile, ResourceManager};
use crate::storage::InMemoryStorage;
use crate::tree::{FolderTree, Node};
use crate::types::CollectionRoot;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// StudyHub CLI - inspect a resource hierarchy through the cache and vote core
#[derive(Parser)]
#[command(name = "studyhub")]
#[command(about = "Browse a mirrored study-resource hierarchy")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory mirrored as the storage provider
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the Academic Resources folder tree
    Tree,
    /// List semesters
    Semesters,
    /// List the subjects of a semester
    Subjects {
        semester: String,
    },
    /// List the files of a subject's category folder with vote scores
    Files {
        semester: String,
        subject: String,
        /// Category folder (notes, pyqs, ...)
        #[arg(default_value = "notes")]
        category: String,
        /// Identity whose votes are shown
        #[arg(long = "as")]
        identity: Option<String>,
    },
    /// List previous-year papers of every subject in a semester
    Pyqs {
        semester: String,
    },
    /// List the faculty directory
    Faculty,
    /// List class schedules
    Schedule,
    /// List timetables
    Timetables,
}

/// Directory name that maps to each collection root
pub fn collection_dir_name(root: CollectionRoot) -> &'static str {
    match root {
        CollectionRoot::AcademicResources => "academic-resources",
        CollectionRoot::FacultyDirectory => "faculty-directory",
        CollectionRoot::Schedules => "schedules",
        CollectionRoot::Timetables => "timetables",
    }
}

/// CLI context holding the facade over the mirrored directory
pub struct CliContext {
    manager: Arc<ResourceManager>,
}

impl CliContext {
    /// Mirror `root_dir` and build the facade. Collections without a matching
    /// directory start out empty.
    pub fn new(root_dir: &Path, config: &PortalConfig) -> Result<Self, StartupError> {
        let (storage, dirs) =
            InMemoryStorage::from_directory(root_dir, config.storage.chunk_size)
                .map_err(ResourceError::from)?;
        let root_id = |root: CollectionRoot| {
            let name = collection_dir_name(root);
            dirs.get(name)
                .cloned()
                .unwrap_or_else(|| storage.create_root(name))
        };
        let collections = CollectionRoots {
            academic_resources: root_id(CollectionRoot::AcademicResources),
            faculty_directory: root_id(CollectionRoot::FacultyDirectory),
            schedules: root_id(CollectionRoot::Schedules),
            timetables: root_id(CollectionRoot::Timetables),
        };
        info!(root = %root_dir.display(), mirrored = dirs.len(), "Directory mirrored");

        let config = PortalConfig {
            collections,
            ..config.clone()
        };
        let manager = ResourceManager::from_config(Arc::new(storage), &config)?;
        Ok(Self { manager })
    }

    /// Load configuration the way the binary does: explicit file, else defaults
    /// plus environment
    pub fn load_config(path: Option<&Path>) -> Result<PortalConfig, StartupError> {
        let config = match path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Ok(config)
    }

    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    /// Execute a CLI command, rendering text tables or pretty JSON
    pub async fn execute(&self, command: &Commands, format: &str) -> Result<String, ResourceError> {
        let json = match format {
            "json" => true,
            "text" => false,
            other => {
                return Err(ResourceError::InvalidInput(format!(
                    "Invalid format: {} (must be 'text' or 'json')",
                    other
                )))
            }
        };
        match command {
            Commands::Tree => {
                let tree = self.manager.list_folders().await?;
                if json {
                    return to_json(&tree);
                }
                let mut out = format!("{}\n\n", format_section_heading("Academic Resources"));
                for child in &tree.children {
                    render_tree(child, 0, &mut out);
                }
                if tree.children.is_empty() {
                    out.push_str("No folders.\n");
                }
                Ok(out)
            }
            Commands::Semesters => {
                let semesters = self.manager.get_semester_list().await?;
                if json {
                    return to_json(&semesters);
                }
                Ok(format_folders("Semesters", &semesters))
            }
            Commands::Subjects { semester } => {
                let subjects = self.manager.get_subject_list(semester).await?;
                if json {
                    return to_json(&subjects);
                }
                Ok(format_folders(&format!("Subjects in {}", semester), &subjects))
            }
            Commands::Files {
                semester,
                subject,
                category,
                identity,
            } => {
                let subject_node = self
                    .manager
                    .get_subject_list(semester)
                    .await?
                    .into_iter()
                    .find(|s| &s.name == subject)
                    .ok_or_else(|| {
                        ResourceError::NotFound(format!("subject '{}' in {}", subject, semester))
                    })?;
                let files = self
                    .manager
                    .get_files_for_subject(&subject_node.id, category, identity.as_deref())
                    .await?;
                if json {
                    return to_json(&files);
                }
                Ok(format_rated_files(
                    &format!("{} / {} / {}", semester, subject, category),
                    &files,
                ))
            }
            Commands::Pyqs { semester } => {
                let grouped = self.manager.get_pyqs(semester, None).await?;
                if json {
                    return to_json(&grouped);
                }
                if grouped.is_empty() {
                    return Ok(format!(
                        "{}\n\nNo previous-year papers.\n",
                        format_section_heading(&format!("Papers in {}", semester))
                    ));
                }
                Ok(grouped
                    .iter()
                    .map(|g| format_rated_files(&g.subject.name, &g.files))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Commands::Faculty => {
                let members = self.manager.list_faculty().await?;
                if json {
                    return to_json(&members);
                }
                Ok(format_faculty(&members))
            }
            Commands::Schedule => {
                let files = self.manager.list_schedule().await?;
                if json {
                    return to_json(&files);
                }
                Ok(format_files("Class Schedules", &files))
            }
            Commands::Timetables => {
                let files = self.manager.list_timetables().await?;
                if json {
                    return to_json(&files);
                }
                Ok(format_files("Timetables", &files))
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ResourceError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ResourceError::InvalidInput(format!("Cannot render JSON: {}", e)))
}

fn format_faculty(members: &[FacultyMember]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Faculty"));
    if members.is_empty() {
        out.push_str("No faculty entries.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Email", "Role", "Contact", "Photo"]);
    for member in members {
        let fields = match &member.entry {
            Some(entry) => vec![
                entry.name.clone(),
                entry.email.clone(),
                entry.role.clone(),
                entry.contact.clone(),
            ],
            None => vec!["-".to_string(); 4],
        };
        let mut row = fields;
        row.push(member.photo.name.clone());
        table.add_row(row);
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// Format a section heading with bold/underline
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn render_tree(tree: &FolderTree, depth: usize, out: &mut String) {
    out.push_str(&format!("{}{}/\n", "  ".repeat(depth), tree.folder.name));
    for child in &tree.children {
        render_tree(child, depth + 1, out);
    }
}

fn format_folders(title: &str, folders: &[Node]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(title));
    if folders.is_empty() {
        out.push_str("None.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Id"]);
    for folder in folders {
        table.add_row(vec![folder.name.clone(), folder.id.to_string()]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

fn format_files(title: &str, files: &[Node]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(title));
    let files: Vec<&Node> = files.iter().filter(|n| n.is_file()).collect();
    if files.is_empty() {
        out.push_str("No files.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Type", "Created"]);
    for file in files {
        table.add_row(vec![
            file.name.clone(),
            file.mime_type.clone().unwrap_or_else(|| "-".to_string()),
            file.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

fn format_rated_files(title: &str, files: &[RatedFile]) -> String {
    let mut out = format!("{}\n\n", format_section_heading(title));
    if files.is_empty() {
        out.push_str("No files.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Score", "Your vote", "Uploaded by"]);
    for rated in files {
        let vote = rated
            .my_vote
            .map(|v| format!("{:?}", v).to_lowercase())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            rated.file.name.clone(),
            rated.score.to_string(),
            vote,
            rated
                .file
                .uploaded_by
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}
