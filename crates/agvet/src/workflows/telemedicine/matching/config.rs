use serde::{Deserialize, Serialize};

/// Weights of the candidate scoring rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub specialty_points: f64,
    pub student_level_points: f64,
    pub educational_focus_points: f64,
    pub rating_multiplier: f64,
    pub rating_cap: f64,
    pub capacity_points: f64,
    /// Load below this share of `max_cases_per_day` earns `capacity_points`.
    pub capacity_ratio: f64,
    pub emergency_points: f64,
    pub shortlist_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            specialty_points: 40.0,
            student_level_points: 20.0,
            educational_focus_points: 20.0,
            rating_multiplier: 4.0,
            rating_cap: 20.0,
            capacity_points: 10.0,
            capacity_ratio: 0.8,
            emergency_points: 10.0,
            shortlist_size: 5,
        }
    }
}
