//! Status registry adapter and the in-memory table used by the daemon host.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Human-readable description of a status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDescriptor {
    pub short_description: String,
    pub long_description: String,
}

/// Flat, ordered list of the options a status can switch to.
pub trait StatusMenu {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Comparison tag of the option at `index`. `None` never matches a request.
    fn tag(&self, index: usize) -> Option<&str>;

    /// Select the option at `index`.
    fn activate(&self, index: usize);
}

/// Read access to the host's statuses.
pub trait StatusRegistry {
    fn lookup_status(&self, name: &str) -> Option<StatusDescriptor>;

    /// Selectable options for `name`, or `None` if the status is unknown or
    /// has no menu.
    fn lookup_menu_for_status(&self, name: &str) -> Option<&dyn StatusMenu>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOptionSpec {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSpec {
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub options: Option<Vec<StatusOptionSpec>>,
}

#[derive(Debug, Deserialize)]
struct StatusFile {
    statuses: Vec<StatusSpec>,
}

#[derive(Debug)]
struct StatusEntry {
    spec: StatusSpec,
    active: Cell<Option<usize>>,
}

impl StatusEntry {
    fn descriptor(&self) -> StatusDescriptor {
        let active = self
            .active
            .get()
            .and_then(|index| self.spec.options.as_ref()?.get(index));

        let pick = |from_option: Option<&String>, fallback: &String| {
            from_option
                .filter(|text| !text.is_empty())
                .unwrap_or(fallback)
                .clone()
        };

        StatusDescriptor {
            short_description: pick(
                active.map(|option| &option.short_description),
                &self.spec.short_description,
            ),
            long_description: pick(
                active.map(|option| &option.long_description),
                &self.spec.long_description,
            ),
        }
    }
}

impl StatusMenu for StatusEntry {
    fn len(&self) -> usize {
        self.spec.options.as_ref().map(Vec::len).unwrap_or(0)
    }

    fn tag(&self, index: usize) -> Option<&str> {
        self.spec
            .options
            .as_ref()?
            .get(index)?
            .tag
            .as_deref()
    }

    fn activate(&self, index: usize) {
        if index >= self.len() {
            debug!(
                "Ignoring activation of option {} on '{}': out of range",
                index, self.spec.name
            );
            return;
        }
        self.active.set(Some(index));
        info!(
            "Status '{}' switched to option {} ({})",
            self.spec.name,
            index,
            self.tag(index).unwrap_or("<untagged>")
        );
    }
}

/// Statuses held in memory, in declaration order.
///
/// Selection state lives in `Cell`s, so the table is meant for the
/// single-threaded daemon loop.
#[derive(Debug, Default)]
pub struct StatusTable {
    entries: Vec<StatusEntry>,
}

impl StatusTable {
    pub fn from_specs(specs: Vec<StatusSpec>) -> Self {
        let entries = specs
            .into_iter()
            .map(|spec| StatusEntry {
                spec,
                active: Cell::new(None),
            })
            .collect();
        Self { entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: StatusFile = serde_json::from_str(json).context("Invalid status table JSON")?;
        Ok(Self::from_specs(file.statuses))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read status table {}", path.display()))?;
        let table = Self::from_json_str(&json)
            .with_context(|| format!("Failed to parse status table {}", path.display()))?;
        info!(
            "Loaded {} statuses from {}",
            table.entries.len(),
            path.display()
        );
        Ok(table)
    }

    /// A small table resembling the toggles an input-method panel shows.
    pub fn builtin() -> Self {
        let option = |tag: &str, short: &str, long: &str| StatusOptionSpec {
            tag: Some(tag.to_string()),
            short_description: short.to_string(),
            long_description: long.to_string(),
        };

        Self::from_specs(vec![
            StatusSpec {
                name: "punc".to_string(),
                short_description: "Punctuation".to_string(),
                long_description: "Punctuation width".to_string(),
                options: Some(vec![
                    option("full", "Full width punct", "Full width punctuation"),
                    option("half", "Half width punct", "Half width punctuation"),
                ]),
            },
            StatusSpec {
                name: "fullwidth".to_string(),
                short_description: "Width".to_string(),
                long_description: "Character width".to_string(),
                options: Some(vec![
                    option("full", "Full width", "Full width characters"),
                    option("half", "Half width", "Half width characters"),
                ]),
            },
            StatusSpec {
                name: "remind".to_string(),
                short_description: "Remind".to_string(),
                long_description: "Word reminder".to_string(),
                options: None,
            },
        ])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&StatusEntry> {
        self.entries.iter().find(|entry| entry.spec.name == name)
    }
}

impl StatusRegistry for StatusTable {
    fn lookup_status(&self, name: &str) -> Option<StatusDescriptor> {
        self.entry(name).map(StatusEntry::descriptor)
    }

    fn lookup_menu_for_status(&self, name: &str) -> Option<&dyn StatusMenu> {
        let entry = self.entry(name)?;
        entry
            .spec
            .options
            .as_ref()
            .map(|_| entry as &dyn StatusMenu)
    }
}
