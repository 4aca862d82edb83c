use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::loader::{load_nutrition_data, LoadedDataset};

/// Memoizes loaded datasets by their exact ordered source list.
///
/// A dataset is built once per distinct list and shared read-only; changing
/// the list (even just its order) is a different cache entry. Entries are
/// never rebuilt or mutated in place.
#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<Vec<PathBuf>, Arc<LoadedDataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, sources: &[PathBuf]) -> Result<Arc<LoadedDataset>> {
        if let Some(dataset) = self.entries.get(sources) {
            return Ok(Arc::clone(dataset));
        }
        let dataset = Arc::new(load_nutrition_data(sources)?);
        self.entries.insert(sources.to_vec(), Arc::clone(&dataset));
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(lines: &[&str]) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_same_source_list_returns_shared_dataset() -> Result<()> {
        let file = fixture(&["Food,Calories", "Soto Ayam,120"])?;
        let sources = vec![file.path().to_path_buf()];

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&sources)?;
        let second = cache.get_or_load(&sources)?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn test_different_source_list_loads_separately() -> Result<()> {
        let a = fixture(&["Food,Calories", "Soto Ayam,120"])?;
        let b = fixture(&["Food,Calories", "Rendang,195"])?;

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&[a.path().to_path_buf()])?;
        let second = cache.get_or_load(&[b.path().to_path_buf()])?;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.food_names, vec!["Rendang"]);
        Ok(())
    }

    #[test]
    fn test_load_failure_is_not_cached() {
        let mut cache = DatasetCache::new();
        let sources = vec![PathBuf::from("does_not_exist.csv")];
        assert!(cache.get_or_load(&sources).is_err());
        // a retry still attempts the load rather than serving a poisoned entry
        assert!(cache.get_or_load(&sources).is_err());
    }
}
