use std::fmt;

use serde::{Deserialize, Serialize};

/// Onboarding checkpoints in the order every veterinarian must clear them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    PersonalInfo,
    ProfessionalInfo,
    LicenseVerification,
    EducationVerification,
    InsuranceVerification,
    SpecializationAssessment,
    PlatformTraining,
    EducationalTraining,
    TrialConsultations,
    FinalApproval,
}

impl OnboardingStep {
    pub const fn ordered() -> [Self; 10] {
        [
            Self::PersonalInfo,
            Self::ProfessionalInfo,
            Self::LicenseVerification,
            Self::EducationVerification,
            Self::InsuranceVerification,
            Self::SpecializationAssessment,
            Self::PlatformTraining,
            Self::EducationalTraining,
            Self::TrialConsultations,
            Self::FinalApproval,
        ]
    }

    pub const fn first() -> Self {
        Self::PersonalInfo
    }

    pub fn position(self) -> usize {
        Self::ordered()
            .iter()
            .position(|step| *step == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Option<Self> {
        Self::ordered().get(self.position() + 1).copied()
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PersonalInfo => "Personal Information",
            Self::ProfessionalInfo => "Professional Information",
            Self::LicenseVerification => "License Verification",
            Self::EducationVerification => "Education Verification",
            Self::InsuranceVerification => "Insurance Verification",
            Self::SpecializationAssessment => "Specialization Assessment",
            Self::PlatformTraining => "Platform Training",
            Self::EducationalTraining => "Educational Training",
            Self::TrialConsultations => "Trial Consultations",
            Self::FinalApproval => "Final Approval",
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::PersonalInfo => "personal_info",
            Self::ProfessionalInfo => "professional_info",
            Self::LicenseVerification => "license_verification",
            Self::EducationVerification => "education_verification",
            Self::InsuranceVerification => "insurance_verification",
            Self::SpecializationAssessment => "specialization_assessment",
            Self::PlatformTraining => "platform_training",
            Self::EducationalTraining => "educational_training",
            Self::TrialConsultations => "trial_consultations",
            Self::FinalApproval => "final_approval",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ordered().into_iter().find(|step| step.key() == key)
    }

    /// Steps whose outcome comes back from the identity/verification port.
    pub const fn is_external_verification(self) -> bool {
        matches!(
            self,
            Self::LicenseVerification | Self::EducationVerification
        )
    }

    pub const fn documents_required(self) -> &'static [&'static str] {
        match self {
            Self::PersonalInfo => &["government_id", "profile_photo"],
            Self::ProfessionalInfo => &["curriculum_vitae", "professional_references"],
            Self::LicenseVerification => &["veterinary_license"],
            Self::EducationVerification => &["dvm_diploma", "academic_transcript"],
            Self::InsuranceVerification => &["malpractice_insurance_certificate"],
            Self::SpecializationAssessment => &["board_certifications", "case_portfolio"],
            Self::PlatformTraining => &[],
            Self::EducationalTraining => &["pedagogy_module_certificate"],
            Self::TrialConsultations => &["trial_consultation_reviews"],
            Self::FinalApproval => &[],
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
