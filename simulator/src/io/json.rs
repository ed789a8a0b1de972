//! Hierarchical JSON output for channel tables and built instruments.
//!
//! Results are organised as nested groups of named entries, the way an HDF5
//! file would hold them. A group is written to disk as one JSON object whose
//! keys keep insertion order.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::table::ChannelTable;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("entry '{0}' exists and is not a group")]
    NotAGroup(String),
}

/// A container results can be written into.
pub trait OutputGroup {
    /// Open the child group `name`, creating it when missing.
    fn create_group(&mut self, name: &str) -> Result<&mut Self, OutputError>
    where
        Self: Sized;

    fn write_table(&mut self, name: &str, table: &ChannelTable) -> Result<(), OutputError>;

    fn write_array(&mut self, name: &str, values: &[f64]) -> Result<(), OutputError>;

    fn write_value<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), OutputError>;
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Group(JsonGroup),
    Value(Value),
}

/// In-memory group of named entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonGroup {
    entries: Vec<(String, Node)>,
}

impl JsonGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: &str, node: Node) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = node,
            None => self.entries.push((name.to_string(), node)),
        }
    }

    /// Child group `name`, if present.
    pub fn group(&self, name: &str) -> Option<&JsonGroup> {
        self.entries.iter().find_map(|(n, node)| match node {
            Node::Group(g) if n == name => Some(g),
            _ => None,
        })
    }

    /// Value entry `name`, if present.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(n, node)| match node {
            Node::Value(v) if n == name => Some(v),
            _ => None,
        })
    }

    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, node)| {
                let value = match node {
                    Node::Group(g) => g.to_value(),
                    Node::Value(v) => v.clone(),
                };
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }

    /// Write the group as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), OutputError> {
        let file = File::create(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_value())?;
        log::info!("results written to {}", path.display());
        Ok(())
    }
}

/// Table as an object of columns, keyed by column name.
fn table_value(table: &ChannelTable) -> Value {
    let mut map = Map::new();
    for column in table.columns() {
        let values = column.values.iter().map(|&v| float_value(v)).collect();
        map.insert(column.name.clone(), Value::Array(values));
    }
    Value::Object(map)
}

/// JSON has no NaN or infinity; those become null.
fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl OutputGroup for JsonGroup {
    fn create_group(&mut self, name: &str) -> Result<&mut Self, OutputError> {
        let idx = match self.entries.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.entries
                    .push((name.to_string(), Node::Group(JsonGroup::default())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[idx].1 {
            Node::Group(group) => Ok(group),
            Node::Value(_) => Err(OutputError::NotAGroup(name.to_string())),
        }
    }

    fn write_table(&mut self, name: &str, table: &ChannelTable) -> Result<(), OutputError> {
        self.insert(name, Node::Value(table_value(table)));
        Ok(())
    }

    fn write_array(&mut self, name: &str, values: &[f64]) -> Result<(), OutputError> {
        let array = values.iter().map(|&v| float_value(v)).collect();
        self.insert(name, Node::Value(Value::Array(array)));
        Ok(())
    }

    fn write_value<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), OutputError> {
        self.insert(name, Node::Value(serde_json::to_value(value)?));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::columns;

    #[test]
    fn test_nested_groups() {
        let mut root = JsonGroup::new();
        let mut table = ChannelTable::new("Phot");
        table.set_column(columns::WAVELENGTH, vec![0.55]).unwrap();
        table.set_column(columns::TOTAL_NOISE, vec![f64::NAN]).unwrap();

        let group = root.create_group("Phot").unwrap();
        group.write_table("Phot", &table).unwrap();
        group.create_group("built_instr").unwrap().write_array("qe", &[0.5]).unwrap();
        // reopening keeps existing content
        root.create_group("Phot").unwrap();

        let value = root.to_value();
        assert_eq!(value["Phot"]["Phot"]["Wavelength"][0], 0.55);
        assert!(value["Phot"]["Phot"]["total_noise"][0].is_null());
        assert_eq!(value["Phot"]["built_instr"]["qe"][0], 0.5);
    }

    #[test]
    fn test_value_is_not_a_group() {
        let mut root = JsonGroup::new();
        root.write_value("info", &"radsim").unwrap();
        assert!(matches!(root.create_group("info"), Err(OutputError::NotAGroup(_))));
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut root = JsonGroup::new();
        root.write_array("x", &[1.0, 2.0]).unwrap();
        root.save(&path).unwrap();
        let back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["x"][1], 2.0);
    }
}
