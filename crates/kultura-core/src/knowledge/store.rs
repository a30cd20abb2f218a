//! Sled-backed store with one tree per cultural category plus an artifacts tree.

use crate::error::StoreError;
use crate::model::{Artifact, Category, CulturalItem, Document};
use sled::Db;
use std::collections::BTreeSet;
use std::path::Path;

const ARTIFACTS_TREE: &str = "artifacts";

/// Store for cultural reference data: one tree per [`Category`] keyed by item
/// id, plus an `artifacts` tree keyed by artifact id.
pub struct KnowledgeStore {
    db: Db,
}

impl KnowledgeStore {
    /// Opens or creates the knowledge DB at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Inserts or replaces a cultural item (key = id).
    pub fn insert_item(&self, item: &CulturalItem) -> Result<(), StoreError> {
        let tree = self.db.open_tree(item.category.tree_name())?;
        tree.insert(item.id.as_bytes(), serde_json::to_vec(item)?)?;
        Ok(())
    }

    /// Returns the item with the given id, searching every category tree.
    pub fn get_item(&self, id: &str) -> Result<Option<CulturalItem>, StoreError> {
        for cat in Category::ALL {
            let tree = self.db.open_tree(cat.tree_name())?;
            if let Some(bytes) = tree.get(id.as_bytes())? {
                return Ok(Some(serde_json::from_slice(&bytes)?));
            }
        }
        Ok(None)
    }

    /// Total cultural items across all categories.
    pub fn item_count(&self) -> Result<usize, StoreError> {
        let mut n = 0;
        for cat in Category::ALL {
            n += self.db.open_tree(cat.tree_name())?.len();
        }
        Ok(n)
    }

    /// All items in one category, in Sled key order.
    pub fn items_in(&self, category: Category) -> Result<Vec<CulturalItem>, StoreError> {
        let tree = self.db.open_tree(category.tree_name())?;
        let mut out = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    /// All cultural items flattened into retrieval documents.
    pub fn all_documents(&self) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        for cat in Category::ALL {
            let tree = self.db.open_tree(cat.tree_name())?;
            for entry in tree.iter() {
                let (_, bytes) = entry?;
                let item: CulturalItem = serde_json::from_slice(&bytes)?;
                docs.push(Document::from_item(&item));
            }
        }
        Ok(docs)
    }

    /// Inserts or replaces an artifact (key = id).
    pub fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let tree = self.db.open_tree(ARTIFACTS_TREE)?;
        tree.insert(artifact.id.as_bytes(), serde_json::to_vec(artifact)?)?;
        Ok(())
    }

    pub fn get_artifact(&self, id: &str) -> Result<Option<Artifact>, StoreError> {
        let tree = self.db.open_tree(ARTIFACTS_TREE)?;
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All artifacts, ordered by id (Sled iteration order).
    pub fn artifacts(&self) -> Result<Vec<Artifact>, StoreError> {
        let tree = self.db.open_tree(ARTIFACTS_TREE)?;
        let mut out = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    /// Artifacts whose culture matches (case-insensitive).
    pub fn artifacts_by_culture(&self, culture: &str) -> Result<Vec<Artifact>, StoreError> {
        let needle = culture.to_lowercase();
        Ok(self
            .artifacts()?
            .into_iter()
            .filter(|a| a.culture.to_lowercase() == needle)
            .collect())
    }

    pub fn artifact_count(&self) -> Result<usize, StoreError> {
        Ok(self.db.open_tree(ARTIFACTS_TREE)?.len())
    }

    /// Distinct cultures across items and artifacts, sorted.
    pub fn cultures(&self) -> Result<Vec<String>, StoreError> {
        let mut set = BTreeSet::new();
        for doc in self.all_documents()? {
            if !doc.metadata.culture.is_empty() {
                set.insert(doc.metadata.culture);
            }
        }
        for artifact in self.artifacts()? {
            if !artifact.culture.is_empty() {
                set.insert(artifact.culture);
            }
        }
        Ok(set.into_iter().collect())
    }

    /// Seeds the store from the JSON files the original curation produced.
    /// Idempotent: a non-empty store is left untouched. Returns
    /// (items_added, artifacts_added).
    pub fn seed_from_json(
        &self,
        dataset_path: &Path,
        artifacts_path: &Path,
    ) -> Result<(usize, usize), StoreError> {
        let mut items_added = 0;
        if self.item_count()? == 0 && dataset_path.exists() {
            let raw = std::fs::read_to_string(dataset_path)?;
            let data: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)?;
            for (key, value) in &data {
                let Some(category) = Category::from_tree_name(key) else {
                    tracing::warn!(key = %key, "seed: unknown category, skipping");
                    continue;
                };
                let Some(entries) = value.as_array() else { continue };
                for (i, entry) in entries.iter().enumerate() {
                    let item = seed_item(category, i, entry)?;
                    self.insert_item(&item)?;
                    items_added += 1;
                }
            }
        }

        let mut artifacts_added = 0;
        if self.artifact_count()? == 0 && artifacts_path.exists() {
            let raw = std::fs::read_to_string(artifacts_path)?;
            let data: serde_json::Value = serde_json::from_str(&raw)?;
            if let Some(entries) = data.get("artifacts").and_then(|v| v.as_array()) {
                for entry in entries {
                    let artifact: Artifact = serde_json::from_value(entry.clone())?;
                    self.insert_artifact(&artifact)?;
                    artifacts_added += 1;
                }
            }
        }

        Ok((items_added, artifacts_added))
    }
}

/// Builds a [`CulturalItem`] from one seed entry, defaulting the id from the
/// category and position when the curation omitted one.
fn seed_item(
    category: Category,
    index: usize,
    entry: &serde_json::Value,
) -> Result<CulturalItem, StoreError> {
    let mut value = entry.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.entry("id".to_string())
            .or_insert_with(|| format!("{}_{}", category.tree_name(), index).into());
        obj.insert("category".to_string(), category.as_str().into());
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, culture: &str, category: Category) -> CulturalItem {
        CulturalItem {
            id: id.into(),
            name: name.into(),
            culture: culture.into(),
            category,
            description: format!("{name} of the {culture} people"),
            significance: String::new(),
            sources: vec![],
        }
    }

    #[test]
    fn insert_and_get_item() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open_path(dir.path()).unwrap();
        let eyo = item("eyo-festival", "Eyo Festival", "Yoruba", Category::Festival);
        store.insert_item(&eyo).unwrap();

        assert_eq!(store.get_item("eyo-festival").unwrap(), Some(eyo));
        assert_eq!(store.item_count().unwrap(), 1);
        assert!(store.get_item("missing").unwrap().is_none());
    }

    #[test]
    fn documents_carry_category_and_culture() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open_path(dir.path()).unwrap();
        store
            .insert_item(&item("adire", "Adire", "Yoruba", Category::ArtForm))
            .unwrap();
        store
            .insert_item(&item("sharo", "Sharo Festival", "Fulani", Category::Festival))
            .unwrap();

        let docs = store.all_documents().unwrap();
        assert_eq!(docs.len(), 2);
        let adire = docs.iter().find(|d| d.id == "adire").unwrap();
        assert_eq!(adire.doc_type, "art_form");
        assert_eq!(adire.metadata.culture, "Yoruba");
    }

    #[test]
    fn artifacts_by_culture_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open_path(dir.path()).unwrap();
        let artifact = Artifact {
            id: "ife-head".into(),
            name: "Ife Bronze Head".into(),
            location: "Ife, Nigeria".into(),
            coordinates: [4.56, 7.47],
            era: "12th-15th century".into(),
            year: "1300".into(),
            description: "Naturalistic brass head".into(),
            significance: "Royal portraiture".into(),
            cultural_context: "Cast for the Ooni's court".into(),
            culture: "Yoruba".into(),
        };
        store.insert_artifact(&artifact).unwrap();

        assert_eq!(store.artifacts_by_culture("yoruba").unwrap().len(), 1);
        assert_eq!(store.artifacts_by_culture("YORUBA").unwrap().len(), 1);
        assert!(store.artifacts_by_culture("Edo").unwrap().is_empty());
        assert_eq!(store.cultures().unwrap(), vec!["Yoruba".to_string()]);
    }

    #[test]
    fn seed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let dataset = data_dir.path().join("cultural_data.json");
        let artifacts = data_dir.path().join("artifacts.json");
        std::fs::write(
            &dataset,
            serde_json::json!({
                "festivals": [
                    { "id": "eyo-festival", "name": "Eyo Festival", "culture": "Yoruba",
                      "description": "Masquerade procession in Lagos" }
                ]
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(&artifacts, serde_json::json!({ "artifacts": [] }).to_string()).unwrap();

        let store = KnowledgeStore::open_path(dir.path()).unwrap();
        let (items, _) = store.seed_from_json(&dataset, &artifacts).unwrap();
        assert_eq!(items, 1);
        let (items_again, _) = store.seed_from_json(&dataset, &artifacts).unwrap();
        assert_eq!(items_again, 0);
        assert_eq!(store.item_count().unwrap(), 1);

        let eyo = store.get_item("eyo-festival").unwrap().unwrap();
        assert_eq!(eyo.category, Category::Festival);
    }
}
