use crate::dataset::{FoodRecord, NutritionTable};

const MISSING_VALUE: &str = "not available";

#[derive(Debug, Clone)]
pub struct RetrievalHit {
    /// `Food` value of the very first matching record.
    pub matched_name: String,
    /// Formatted stanzas for the first `top_k` matches, ready for the summarizer.
    pub context_block: String,
}

/// Case-insensitive substring lookup of `query` against food names.
///
/// When a multi-word query matches nothing, the match is retried with the
/// first word only (e.g. "fried rice with egg" falls back to "fried").
/// Only the first word is ever tried; downstream behavior depends on this
/// exact fallback. Returns `None` when nothing matches either way.
pub fn retrieve(table: &NutritionTable, query: &str, top_k: usize) -> Option<RetrievalHit> {
    let needle = query.to_lowercase();
    let mut matches: Vec<&FoodRecord> = table
        .records()
        .iter()
        .filter(|r| r.food.to_lowercase().contains(&needle))
        .collect();

    if matches.is_empty() {
        let mut words = query.split_whitespace();
        if let (Some(first_word), Some(_)) = (words.next(), words.next()) {
            let first_needle = first_word.to_lowercase();
            matches = table
                .records()
                .iter()
                .filter(|r| r.food.to_lowercase().contains(&first_needle))
                .collect();
        }
    }

    let matched_name = matches.first()?.food.clone();

    let mut context_block = String::new();
    for record in matches.iter().take(top_k) {
        push_stanza(&mut context_block, query, record);
    }

    Some(RetrievalHit {
        matched_name,
        context_block,
    })
}

fn push_stanza(context: &mut String, query: &str, record: &FoodRecord) {
    context.push_str(&format!("Nutrition data for '{}':\n", query));
    context.push_str(&format!("- Matched food: {}\n", record.food));
    context.push_str(&format!(
        "- Serving size: {}\n",
        record.measure.as_deref().unwrap_or(MISSING_VALUE)
    ));
    context.push_str(&format!("- Calories: {}\n", render_number(record.calories)));
    context.push_str(&format!("- Protein (g): {}\n", render_number(record.protein)));
    context.push_str(&format!("- Fat (g): {}\n", render_number(record.fat)));
    context.push_str(&format!("- Carbs (g): {}\n", render_number(record.carbs)));
    context.push_str("---\n");
}

fn render_number(value: Option<f32>) -> String {
    value.map_or_else(|| MISSING_VALUE.to_string(), |v| v.to_string())
}

/// Per-food outcomes of a multi-food query. A miss on one food never
/// prevents a match on another.
#[derive(Debug, Default)]
pub struct BatchRetrieval {
    /// (original query, hit) pairs in input order.
    pub found: Vec<(String, RetrievalHit)>,
    pub not_found: Vec<String>,
}

impl BatchRetrieval {
    /// The caller-supplied query names that matched, for display by the
    /// summarizer (not the database names).
    pub fn found_names(&self) -> Vec<String> {
        self.found.iter().map(|(query, _)| query.clone()).collect()
    }

    /// All hit contexts concatenated in input order.
    pub fn aggregated_context(&self) -> String {
        self.found
            .iter()
            .map(|(_, hit)| hit.context_block.as_str())
            .collect()
    }
}

pub fn retrieve_batch(table: &NutritionTable, foods: &[String], top_k: usize) -> BatchRetrieval {
    let mut batch = BatchRetrieval::default();
    for food in foods {
        match retrieve(table, food, top_k) {
            Some(hit) => batch.found.push((food.clone(), hit)),
            None => batch.not_found.push(food.clone()),
        }
    }
    batch
}
