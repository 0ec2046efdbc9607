mod row;

pub use row::Row;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::template::Template;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A compiled index: header attribute names plus the ordered rows
/// parsed from an index file, and the folder templates are resolved
/// relative to.
#[derive(Debug)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Row>,
    template_folder: PathBuf,
}

impl Table {
    /// Reads and validates an index file at `index_path`; templates it
    /// references are resolved relative to `template_folder`.
    #[instrument(skip(index_path, template_folder))]
    pub fn open(index_path: impl AsRef<Path>, template_folder: impl AsRef<Path>) -> Result<Self> {
        let index_path = index_path.as_ref();
        let text = std::fs::read_to_string(index_path)
            .map_err(|e| Error::Table(format!("{}: {e}", index_path.display())))?;
        Self::parse(&text, template_folder)
    }

    pub fn parse(text: &str, template_folder: impl AsRef<Path>) -> Result<Self> {
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();

            if header.is_none() {
                if fields.first().map(String::as_str) != Some("template")
                    || fields.last().map(String::as_str) != Some("command")
                {
                    return Err(Error::Table(format!(
                        "header at line {line_num} must start with 'template' and end with 'command'"
                    )));
                }
                header = Some(fields);
                continue;
            }

            let header = header.as_ref().unwrap();
            rows.push(Row::parse(header, &fields, line_num)?);
        }

        let header = header.ok_or_else(|| Error::Table("index has no header row".to_string()))?;
        debug!(rows = rows.len(), "loaded table");

        Ok(Self {
            header,
            rows,
            template_folder: template_folder.as_ref().to_path_buf(),
        })
    }

    /// Finds the first row matching `command` and `tags`, compiles and
    /// runs its template against `text`, and returns the records.
    #[instrument(skip(self, text), fields(command))]
    pub fn parse_command(
        &self,
        command: &str,
        tags: &IndexMap<String, String>,
        text: &str,
    ) -> Result<Vec<Record>> {
        for tag_name in tags.keys() {
            if !self.header.iter().any(|h| h == tag_name) {
                return Err(Error::Table(format!("unknown attribute '{tag_name}'")));
            }
        }

        for row in &self.rows {
            if row.matches(command, tags)? {
                let path = self.template_folder.join(&row.template);
                debug!(template = %row.template, "dispatching to template");
                let mut template = Template::from_path(&path)?;
                return template.parse(text);
            }
        }

        Err(Error::TemplateNotFound(format!(
            "no template matches command '{command}'"
        )))
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
