use super::super::domain::{
    CaseRequirements, UrgencyLevel, VeterinarianProfile, VeterinarianStatus,
};
use super::config::MatchingConfig;
use super::{CandidateSnapshot, MatchFactor, ScoreComponent};

/// Active, has a schedule slot covering the requested instant, and is below daily capacity.
pub(crate) fn is_eligible(candidate: &CandidateSnapshot, requirements: &CaseRequirements) -> bool {
    let profile = &candidate.profile;
    profile.status == VeterinarianStatus::Active
        && profile
            .availability
            .has_slot_at(requirements.scheduled_time)
        && candidate.current_load < profile.availability.max_cases_per_day
}

pub(crate) fn score_candidate(
    candidate: &CandidateSnapshot,
    requirements: &CaseRequirements,
    config: &MatchingConfig,
) -> (Vec<ScoreComponent>, f64) {
    let profile: &VeterinarianProfile = &candidate.profile;
    let mut components = Vec::new();
    let mut total_score = 0.0;

    if profile.has_specialty(&requirements.specialty) {
        components.push(ScoreComponent {
            factor: MatchFactor::Specialty,
            score: config.specialty_points,
            notes: format!("lists specialty {}", requirements.specialty),
        });
        total_score += config.specialty_points;
    }

    if profile
        .preferences
        .student_levels
        .contains(&requirements.student_level)
    {
        components.push(ScoreComponent {
            factor: MatchFactor::StudentLevel,
            score: config.student_level_points,
            notes: format!("prefers {:?} learners", requirements.student_level),
        });
        total_score += config.student_level_points;
    }

    let shared_objectives: Vec<&str> = requirements
        .educational_objectives
        .iter()
        .filter(|objective| profile.preferences.educational_focus.contains(*objective))
        .map(String::as_str)
        .collect();
    if !shared_objectives.is_empty() {
        components.push(ScoreComponent {
            factor: MatchFactor::EducationalFocus,
            score: config.educational_focus_points,
            notes: format!("educational focus covers {}", shared_objectives.join(", ")),
        });
        total_score += config.educational_focus_points;
    }

    let rating = profile.performance.client_satisfaction.overall_rating;
    let rating_score = (rating * config.rating_multiplier).clamp(0.0, config.rating_cap);
    if rating_score > 0.0 {
        components.push(ScoreComponent {
            factor: MatchFactor::Rating,
            score: rating_score,
            notes: format!("overall rating {rating:.2}"),
        });
        total_score += rating_score;
    }

    let max_cases = profile.availability.max_cases_per_day as f64;
    let load = candidate.current_load as f64;
    if load < max_cases * config.capacity_ratio {
        components.push(ScoreComponent {
            factor: MatchFactor::Capacity,
            score: config.capacity_points,
            notes: format!(
                "{} of {} daily cases in use",
                candidate.current_load, profile.availability.max_cases_per_day
            ),
        });
        total_score += config.capacity_points;
    }

    if requirements.urgency == UrgencyLevel::Emergency && profile.availability.emergency.available
    {
        components.push(ScoreComponent {
            factor: MatchFactor::EmergencyCoverage,
            score: config.emergency_points,
            notes: format!(
                "emergency response within {} minutes",
                profile.availability.emergency.response_time_minutes
            ),
        });
        total_score += config.emergency_points;
    }

    (components, total_score)
}
