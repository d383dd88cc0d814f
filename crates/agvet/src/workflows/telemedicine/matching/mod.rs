mod config;
mod rules;

pub use config::MatchingConfig;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::{CaseRequirements, VeterinarianId, VeterinarianProfile};

/// Point-in-time view of a veterinarian used for ranking. Load may be slightly stale.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSnapshot {
    pub profile: VeterinarianProfile,
    pub current_load: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFactor {
    Specialty,
    StudentLevel,
    EducationalFocus,
    Rating,
    Capacity,
    EmergencyCoverage,
}

/// Discrete contribution to a candidate's score, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: MatchFactor,
    pub score: f64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub vet_id: VeterinarianId,
    pub name: String,
    pub total_score: f64,
    pub current_load: u32,
    pub components: Vec<ScoreComponent>,
}

/// Stateless ranker applying the rubric to profile snapshots.
#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Ranked shortlist of eligible candidates; empty when nobody qualifies.
    pub fn rank(
        &self,
        candidates: &[CandidateSnapshot],
        requirements: &CaseRequirements,
    ) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = candidates
            .iter()
            .filter(|candidate| rules::is_eligible(candidate, requirements))
            .map(|candidate| {
                let (components, total_score) =
                    rules::score_candidate(candidate, requirements, &self.config);
                MatchResult {
                    vet_id: candidate.profile.id.clone(),
                    name: candidate.profile.name.clone(),
                    total_score,
                    current_load: candidate.current_load,
                    components,
                }
            })
            .collect();

        results.sort_by(compare_results);
        results.truncate(self.config.shortlist_size);
        results
    }
}

fn compare_results(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| a.current_load.cmp(&b.current_load))
        .then_with(|| a.vet_id.cmp(&b.vet_id))
}
