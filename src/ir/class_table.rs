//! Ordered class-name table shared by both sides of a conversion.
//!
//! The table is a bijection: name <-> 0-based [`ClassId`] <-> 1-based
//! [`CategoryId`]. Both directions are O(1). Feeding different tables (or
//! the same names in a different order) to the two halves of a pipeline
//! silently relabels every box, so callers should load it once and reuse
//! it.
//!
//! Tables can be built from a name list, a `classes.txt` file (one name
//! per line) or an Ultralytics `data.yaml` whose `names` key is either a
//! list or an index map.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{CategoryId, ClassId};
use crate::error::BoxconvError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassTable {
    names: Vec<String>,
    index: HashMap<String, ClassId>,
}

impl ClassTable {
    /// Builds a table from names in class-id order.
    ///
    /// Names are trimmed. Empty and duplicate names are rejected because
    /// either would break the name <-> id bijection.
    pub fn new<I, S>(names: I) -> Result<Self, BoxconvError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = ClassTable::default();
        for raw in names {
            let name = raw.as_ref().trim();
            if name.is_empty() {
                return Err(BoxconvError::InvalidClassTable(format!(
                    "class {} has an empty name",
                    table.names.len()
                )));
            }
            let id = ClassId::new(table.names.len());
            if table.index.insert(name.to_string(), id).is_some() {
                return Err(BoxconvError::InvalidClassTable(format!(
                    "duplicate class name '{name}'"
                )));
            }
            table.names.push(name.to_string());
        }
        Ok(table)
    }

    /// Parses a comma-separated list such as `cat,dog,person`.
    ///
    /// One trailing comma is allowed. Any other blank entry would shift every
    /// later id, so it is an error.
    pub fn from_delimited(list: &str) -> Result<Self, BoxconvError> {
        let mut entries: Vec<&str> = list.split(',').map(str::trim).collect();
        if entries.len() > 1 && entries.last().is_some_and(|last| last.is_empty()) {
            entries.pop();
        }
        if let Some(entry_idx) = entries.iter().position(|name| name.is_empty()) {
            return Err(BoxconvError::InvalidClassTable(format!(
                "entry {} of the class list is empty",
                entry_idx + 1
            )));
        }
        Self::new(entries)
    }

    /// Loads a table from `data.yaml`/`.yml` or from a plain `classes.txt`.
    pub fn from_file(path: &Path) -> Result<Self, BoxconvError> {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let data = fs::read_to_string(path).map_err(BoxconvError::Io)?;
        let table = if is_yaml {
            Self::from_data_yaml_str(&data, path)?
        } else {
            Self::from_classes_txt_str(&data)?
        };
        log::debug!("loaded {} class(es) from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parses `classes.txt` content. Trailing blank lines are ignored;
    /// a blank line in the middle would shift every later id, so it is an error.
    pub fn from_classes_txt_str(data: &str) -> Result<Self, BoxconvError> {
        let lines: Vec<&str> = data.trim_end().lines().collect();
        if let Some(line_idx) = lines.iter().position(|line| line.trim().is_empty()) {
            return Err(BoxconvError::InvalidClassTable(format!(
                "line {} is empty",
                line_idx + 1
            )));
        }
        Self::new(lines)
    }

    /// Parses the `names` key of an Ultralytics `data.yaml`.
    pub fn from_data_yaml_str(data: &str, path: &Path) -> Result<Self, BoxconvError> {
        let parsed: DataYaml =
            serde_yaml::from_str(data).map_err(|source| BoxconvError::ClassFileParse {
                path: path.to_path_buf(),
                source,
            })?;

        match parsed.names {
            DataYamlNames::Sequence(names) => Self::new(names),
            DataYamlNames::Mapping(mapping) => {
                // Ids must be dense 0..N; a gap would leave a class without a name.
                for (expected, index) in mapping.keys().enumerate() {
                    if *index != expected {
                        return Err(BoxconvError::InvalidClassTable(format!(
                            "data.yaml names are missing index {expected}"
                        )));
                    }
                }
                Self::new(mapping.into_values())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in class-id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name_of(&self, class_id: ClassId) -> Option<&str> {
        self.names.get(class_id.as_usize()).map(String::as_str)
    }

    pub fn class_id_of(&self, name: &str) -> Option<ClassId> {
        self.index.get(name).copied()
    }

    pub fn category_id_of(&self, name: &str) -> Option<CategoryId> {
        self.class_id_of(name).map(ClassId::to_category_id)
    }

    pub fn name_of_category(&self, category_id: CategoryId) -> Option<&str> {
        category_id
            .to_class_id()
            .and_then(|class_id| self.name_of(class_id))
    }

    /// Iterates `(class id, name)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (ClassId::new(idx), name.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassTable {
        ClassTable::new(["cat", "dog", "person"]).expect("build table")
    }

    #[test]
    fn lookups_are_inverse() {
        let table = table();
        for (class_id, name) in table.iter() {
            assert_eq!(table.class_id_of(name), Some(class_id));
            assert_eq!(table.name_of(class_id), Some(name));
            let category_id = table.category_id_of(name).expect("category id");
            assert_eq!(category_id.as_u64(), class_id.as_usize() as u64 + 1);
            assert_eq!(table.name_of_category(category_id), Some(name));
        }
    }

    #[test]
    fn unknown_lookups_return_none() {
        let table = table();
        assert_eq!(table.class_id_of("horse"), None);
        assert_eq!(table.name_of(ClassId::new(3)), None);
        assert_eq!(table.name_of_category(CategoryId::new(0)), None);
        assert_eq!(table.name_of_category(CategoryId::new(4)), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ClassTable::new(["cat", "dog", "cat"]).unwrap_err();
        assert!(matches!(err, BoxconvError::InvalidClassTable(_)));
    }

    #[test]
    fn empty_names_are_rejected() {
        let err = ClassTable::new(["cat", "  "]).unwrap_err();
        assert!(matches!(err, BoxconvError::InvalidClassTable(_)));
    }

    #[test]
    fn delimited_list_allows_trailing_comma() {
        let table = ClassTable::from_delimited(" cat, dog ,person,").expect("parse list");
        assert_eq!(table.names(), ["cat", "dog", "person"]);
    }

    #[test]
    fn delimited_list_rejects_blank_entries() {
        let err = ClassTable::from_delimited("cat,,dog").unwrap_err();
        match err {
            BoxconvError::InvalidClassTable(message) => assert!(message.contains("entry 2")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ClassTable::from_delimited(",cat").is_err());
        assert!(ClassTable::from_delimited("").is_err());
    }

    #[test]
    fn classes_txt_allows_trailing_newlines_only() {
        let table = ClassTable::from_classes_txt_str("cat\ndog\n\n").expect("parse classes");
        assert_eq!(table.len(), 2);

        let err = ClassTable::from_classes_txt_str("cat\n\ndog\n").unwrap_err();
        assert!(matches!(err, BoxconvError::InvalidClassTable(_)));
    }

    #[test]
    fn data_yaml_accepts_sequence_and_mapping() {
        let seq = ClassTable::from_data_yaml_str("names:\n  - cat\n  - dog\n", Path::new("a.yaml"))
            .expect("parse sequence");
        let map = ClassTable::from_data_yaml_str(
            "path: .\nnames:\n  1: dog\n  0: cat\n",
            Path::new("b.yaml"),
        )
        .expect("parse mapping");
        assert_eq!(seq, map);
    }

    #[test]
    fn data_yaml_mapping_with_gap_is_rejected() {
        let err = ClassTable::from_data_yaml_str("names:\n  0: cat\n  2: dog\n", Path::new("c.yaml"))
            .unwrap_err();
        assert!(matches!(err, BoxconvError::InvalidClassTable(_)));
    }

    #[test]
    fn from_file_dispatches_on_extension() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let yaml = temp.path().join("data.yaml");
        let txt = temp.path().join("classes.txt");
        fs::write(&yaml, "names: [cat, dog]\n").expect("write yaml");
        fs::write(&txt, "cat\ndog\n").expect("write txt");

        assert_eq!(
            ClassTable::from_file(&yaml).expect("read yaml"),
            ClassTable::from_file(&txt).expect("read txt")
        );
    }
}
