use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

// Canonical column names every source is reconciled into
pub const FOOD_COL: &str = "Food";
pub const MEASURE_COL: &str = "Measure";
pub const CALORIES_COL: &str = "Calories";
pub const PROTEIN_COL: &str = "Protein";
pub const FAT_COL: &str = "Fat";
pub const CARBS_COL: &str = "Carbs";

/// Maps a source-specific column spelling to its canonical name.
/// Returns `None` for columns not covered by the alias map; those pass
/// through under their original name and are ignored downstream.
pub fn canonical_column(header: &str) -> Option<&'static str> {
    match header {
        "Food" | "Item" | "name" => Some(FOOD_COL),
        "Measure" | "Serving Size" => Some(MEASURE_COL),
        "Calories" | "calories" => Some(CALORIES_COL),
        "Protein" | "Protein (g)" | "proteins" => Some(PROTEIN_COL),
        "Fat" | "Total Fat (g)" | "fat" => Some(FAT_COL),
        "Carbs" | "Carbohydrates (g)" | "carbohydrate" => Some(CARBS_COL),
        _ => None,
    }
}

fn parse_optional_f32(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FoodRecord {
    pub food: String,
    pub measure: Option<String>,
    pub calories: Option<f32>,
    pub protein: Option<f32>,
    pub fat: Option<f32>,
    pub carbs: Option<f32>,
    /// Columns outside the canonical schema, kept under their source names.
    pub extra: HashMap<String, String>,
}

/// All successfully loaded sources concatenated in source-list order, row
/// order preserved within each source. Never mutated after construction;
/// the same food name may appear multiple times when datasets disagree.
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    records: Vec<FoodRecord>,
}

impl NutritionTable {
    pub fn records(&self) -> &[FoodRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A non-fatal problem loading one source; the remaining sources still load.
#[derive(Debug, Clone)]
pub struct SourceWarning {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub table: NutritionTable,
    /// Distinct `Food` values in first-seen order.
    pub food_names: Vec<String>,
    pub warnings: Vec<SourceWarning>,
}

/// Loads and combines all nutrition CSV sources.
///
/// Missing files are skipped silently (sources are optional/alternative
/// datasets). A source that fails to parse, or that has no `Food` column
/// after renaming, contributes nothing; parse failures are reported as
/// warnings. Fails only when no source yields any usable rows.
pub fn load_nutrition_data(sources: &[PathBuf]) -> Result<LoadedDataset> {
    let mut records: Vec<FoodRecord> = Vec::new();
    let mut warnings: Vec<SourceWarning> = Vec::new();

    for path in sources {
        if !path.exists() {
            continue;
        }
        match load_source(path) {
            Ok(Some(rows)) => records.extend(rows),
            Ok(None) => {} // no Food column after renaming
            Err(e) => warnings.push(SourceWarning {
                path: path.clone(),
                message: format!("{:#}", e),
            }),
        }
    }

    if records.is_empty() {
        return Err(anyhow::anyhow!(
            "No nutrition data could be loaded from any source"
        ));
    }

    let mut seen = HashSet::new();
    let mut food_names = Vec::new();
    for record in &records {
        if seen.insert(record.food.clone()) {
            food_names.push(record.food.clone());
        }
    }

    Ok(LoadedDataset {
        table: NutritionTable { records },
        food_names,
        warnings,
    })
}

/// Parses one CSV source into records under the canonical schema.
/// Returns `Ok(None)` when the source lacks a `Food` column entirely.
fn load_source(path: &Path) -> Result<Option<Vec<FoodRecord>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open nutrition CSV at {:?}", path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = rdr.headers()?.clone();
    let renamed: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let name = canonical_column(h).map_or_else(|| h.to_string(), str::to_string);
            (idx, name)
        })
        .collect();

    // First matching index wins if a source carries duplicate spellings
    let col_idx = |canonical: &str| {
        renamed
            .iter()
            .find(|(_, name)| name == canonical)
            .map(|(idx, _)| *idx)
    };

    let Some(food_idx) = col_idx(FOOD_COL) else {
        return Ok(None);
    };
    let measure_idx = col_idx(MEASURE_COL);
    let calories_idx = col_idx(CALORIES_COL);
    let protein_idx = col_idx(PROTEIN_COL);
    let fat_idx = col_idx(FAT_COL);
    let carbs_idx = col_idx(CARBS_COL);

    let canonical_indices: HashSet<usize> =
        [Some(food_idx), measure_idx, calories_idx, protein_idx, fat_idx, carbs_idx]
            .into_iter()
            .flatten()
            .collect();

    let mut rows = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let food = record.get(food_idx).unwrap_or("").trim().to_string();
        if food.is_empty() {
            // dropna on Food
            continue;
        }

        let get_str = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let get_num = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i)).and_then(parse_optional_f32)
        };

        let mut extra = HashMap::new();
        for (idx, name) in &renamed {
            if !canonical_indices.contains(idx) {
                if let Some(value) = record.get(*idx) {
                    extra.insert(name.clone(), value.to_string());
                }
            }
        }

        rows.push(FoodRecord {
            food,
            measure: get_str(measure_idx),
            calories: get_num(calories_idx),
            protein: get_num(protein_idx),
            fat: get_num(fat_idx),
            carbs: get_num(carbs_idx),
            extra,
        });
    }

    Ok(Some(rows))
}
