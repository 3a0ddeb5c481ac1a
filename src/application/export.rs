//! Serializes an ordered topic sequence into the toolchain's input document.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use askama::Template;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::domain::entities::{BODY_PROPERTY, TopicRecord};
use crate::domain::types::TopicId;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("topic graph {container_id} not found")]
    ContainerNotFound { container_id: TopicId },
    #[error("failed to render `{file}`")]
    Template {
        file: String,
        #[source]
        source: askama::Error,
    },
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Produces the intermediate document consumed by the rendering toolchain.
pub trait DocumentExporter: Send + Sync {
    /// Write `<container id>.xml` for the sequence and return its path.
    fn export(
        &self,
        container: &TopicRecord,
        sequence: &[TopicRecord],
    ) -> Result<PathBuf, ExportError>;
}

/// Location of the intermediate document for a container inside `dir`.
pub fn intermediate_document_path(dir: &Path, container_id: TopicId) -> PathBuf {
    dir.join(format!("{container_id}.xml"))
}

fn topic_file_name(id: TopicId) -> String {
    format!("topic-{id}.dita")
}

struct MapEntry {
    href: String,
    navtitle: String,
}

#[derive(Template)]
#[template(path = "dita/map.xml", escape = "html")]
struct DitaMapTemplate {
    map_id: String,
    title: String,
    entries: Vec<MapEntry>,
}

#[derive(Template)]
#[template(path = "dita/topic.xml", escape = "html")]
struct DitaTopicTemplate {
    topic_id: String,
    title: String,
    paragraphs: Vec<String>,
}

/// Writes a DITA map referencing one DITA topic file per sequence entry.
#[derive(Debug, Clone)]
pub struct DitaMapExporter {
    work_dir: PathBuf,
}

impl DitaMapExporter {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn write_atomically(&self, path: &Path, contents: &str) -> Result<(), ExportError> {
        let io_error = |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = NamedTempFile::new_in(&self.work_dir).map_err(io_error)?;
        file.write_all(contents.as_bytes()).map_err(io_error)?;
        file.flush().map_err(io_error)?;
        file.persist(path).map_err(|err| io_error(err.error))?;
        Ok(())
    }
}

impl DocumentExporter for DitaMapExporter {
    fn export(
        &self,
        container: &TopicRecord,
        sequence: &[TopicRecord],
    ) -> Result<PathBuf, ExportError> {
        let mut entries = Vec::with_capacity(sequence.len());
        for topic in sequence {
            let file = topic_file_name(topic.id);
            let rendered = DitaTopicTemplate {
                topic_id: format!("topic-{}", topic.id),
                title: topic.value.clone(),
                paragraphs: paragraphs(topic.child_text(BODY_PROPERTY).unwrap_or_default()),
            }
            .render()
            .map_err(|source| ExportError::Template {
                file: file.clone(),
                source,
            })?;
            self.write_atomically(&self.work_dir.join(&file), &rendered)?;
            entries.push(MapEntry {
                href: file,
                navtitle: topic.value.clone(),
            });
        }

        let map_path = intermediate_document_path(&self.work_dir, container.id);
        let map = DitaMapTemplate {
            map_id: format!("map-{}", container.id),
            title: container.value.clone(),
            entries,
        }
        .render()
        .map_err(|source| ExportError::Template {
            file: format!("{}.xml", container.id),
            source,
        })?;
        self.write_atomically(&map_path, &map)?;

        info!(
            target = "application::export",
            op = "export::dita_map",
            container_id = %container.id,
            topics = sequence.len(),
            path = %map_path.display(),
            "Intermediate DITA map written"
        );
        Ok(map_path)
    }
}

fn paragraphs(body: &str) -> Vec<String> {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}
