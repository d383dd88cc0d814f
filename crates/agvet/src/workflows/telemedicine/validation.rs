use super::domain::{Availability, CaseRequest, CaseRequirements, NewTask, NewVeterinarian, Specialization};
use super::onboarding::OnboardingStep;

/// Input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("at least one specialization with a topic is required")]
    NoSpecializations,
    #[error("max_cases_per_day must be greater than zero")]
    ZeroCapacity,
    #[error("time slot ending at {end} does not start before it ends")]
    InvertedSlot { end: chrono::NaiveTime },
    #[error("blackout period '{0}' ends before it starts")]
    InvertedBlackout(String),
    #[error("response time commitment must be a positive number of minutes")]
    InvalidCommitment,
    #[error("rating must be between 1 and 5 (got {0})")]
    RatingOutOfRange(f64),
    #[error("step {0} is not verified by an external provider")]
    NotVerificationStep(OnboardingStep),
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

pub fn validate_registration(submission: &NewVeterinarian) -> Result<(), ValidationError> {
    require(&submission.id.0, "id")?;
    require(&submission.name, "name")?;
    require(&submission.email, "email")?;
    require(&submission.license.number, "license.number")?;
    require(&submission.license.state, "license.state")?;
    require(&submission.education.institution, "education.institution")?;
    require(&submission.education.degree, "education.degree")?;
    validate_specializations(&submission.specializations)?;
    validate_availability(&submission.availability)?;

    let commitment = submission.response_time_commitment_minutes;
    if !commitment.is_finite() || commitment <= 0.0 {
        return Err(ValidationError::InvalidCommitment);
    }
    Ok(())
}

pub fn validate_specializations(specializations: &[Specialization]) -> Result<(), ValidationError> {
    if specializations.is_empty()
        || specializations
            .iter()
            .any(|specialization| specialization.topic.trim().is_empty())
    {
        return Err(ValidationError::NoSpecializations);
    }
    Ok(())
}

pub fn validate_availability(availability: &Availability) -> Result<(), ValidationError> {
    if availability.max_cases_per_day == 0 {
        return Err(ValidationError::ZeroCapacity);
    }

    for weekday in [
        chrono::Weekday::Mon,
        chrono::Weekday::Tue,
        chrono::Weekday::Wed,
        chrono::Weekday::Thu,
        chrono::Weekday::Fri,
        chrono::Weekday::Sat,
        chrono::Weekday::Sun,
    ] {
        if let Some(slot) = availability
            .weekly_schedule
            .day(weekday)
            .slots
            .iter()
            .find(|slot| slot.start >= slot.end)
        {
            return Err(ValidationError::InvertedSlot { end: slot.end });
        }
    }

    if let Some(period) = availability
        .blackout_periods
        .iter()
        .find(|period| period.start >= period.end)
    {
        return Err(ValidationError::InvertedBlackout(period.reason.clone()));
    }
    Ok(())
}

pub fn validate_requirements(requirements: &CaseRequirements) -> Result<(), ValidationError> {
    require(&requirements.specialty, "specialty")
}

pub fn validate_case(request: &CaseRequest) -> Result<(), ValidationError> {
    require(&request.case_id.0, "case_id")?;
    validate_requirements(&request.requirements)
}

pub fn validate_task(task: &NewTask) -> Result<(), ValidationError> {
    require(&task.title, "title")
}

pub fn validate_rating(rating: f64) -> Result<(), ValidationError> {
    if rating.is_finite() && (1.0..=5.0).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::RatingOutOfRange(rating))
    }
}
