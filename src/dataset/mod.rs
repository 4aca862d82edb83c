pub mod cache;
pub mod loader;

// Re-export key structs/functions for easier access from outside the dataset module
pub use cache::DatasetCache;
pub use loader::{load_nutrition_data, FoodRecord, LoadedDataset, NutritionTable, SourceWarning};
