//! Records stored in the backend tables
//!
//! `profiles`, `volunteer_profiles`, `activity_submissions` and `units`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

pub const PROFILES_TABLE: &str = "profiles";
pub const VOLUNTEER_PROFILES_TABLE: &str = "volunteer_profiles";
pub const ACTIVITY_SUBMISSIONS_TABLE: &str = "activity_submissions";
pub const UNITS_TABLE: &str = "units";

/// Identity record created at sign up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub unit_id: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub district: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Volunteer application status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerStatus {
    Pending,
    Approved,
    Rejected,
    Certified,
}

impl VolunteerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolunteerStatus::Pending => "pending",
            VolunteerStatus::Approved => "approved",
            VolunteerStatus::Rejected => "rejected",
            VolunteerStatus::Certified => "certified",
        }
    }

    /// Approved and certified volunteers may submit activities.
    pub fn can_submit_activities(&self) -> bool {
        match self {
            VolunteerStatus::Approved | VolunteerStatus::Certified => true,
            VolunteerStatus::Pending | VolunteerStatus::Rejected => false,
        }
    }
}

impl fmt::Display for VolunteerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extended registration record; one per student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolunteerProfile {
    pub id: String,
    pub user_id: String,
    pub unit_id: String,
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: NaiveDate,
    pub blood_group: String,
    pub height_cm: f32,
    pub weight_kg: f32,
    pub address: String,
    pub district: String,
    pub pincode: String,
    pub languages_known: Vec<String>,
    pub phone: String,
    pub status: VolunteerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row sent when a student registers as a volunteer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVolunteerProfile {
    pub user_id: String,
    pub unit_id: String,
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: NaiveDate,
    pub blood_group: String,
    pub height_cm: f32,
    pub weight_kg: f32,
    pub address: String,
    pub district: String,
    pub pincode: String,
    pub languages_known: Vec<String>,
    pub phone: String,
    pub status: VolunteerStatus,
}

/// Submission review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    BloodDonation,
    TreeTagging,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::BloodDonation => "blood_donation",
            ActivityKind::TreeTagging => "tree_tagging",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodDonation {
    pub donated_on: NaiveDate,
    pub blood_group: String,
    pub venue: String,
    pub units: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeTagging {
    pub species: String,
    pub location: String,
    pub tagged_on: NaiveDate,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photo_url: Option<String>,
}

/// Kind-specific payload, stored as JSON in the `details` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityDetails {
    BloodDonation(BloodDonation),
    TreeTagging(TreeTagging),
}

impl ActivityDetails {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityDetails::BloodDonation(_) => ActivityKind::BloodDonation,
            ActivityDetails::TreeTagging(_) => ActivityKind::TreeTagging,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivitySubmission {
    pub id: String,
    pub student_id: String,
    pub unit_id: String,
    pub kind: ActivityKind,
    pub details: ActivityDetails,
    pub status: SubmissionStatus,
    pub points: Option<u32>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivitySubmission {
    /// Points that count towards totals: only approved submissions award any.
    pub fn awarded_points(&self) -> u32 {
        match self.status {
            SubmissionStatus::Approved => self.points.unwrap_or(0),
            SubmissionStatus::Pending | SubmissionStatus::Rejected => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewActivitySubmission {
    pub student_id: String,
    pub unit_id: String,
    pub kind: ActivityKind,
    pub details: ActivityDetails,
    pub status: SubmissionStatus,
}

/// Fields written by a review action.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionReview {
    pub status: SubmissionStatus,
    pub points: Option<u32>,
    pub reviewed_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Organizational unit with its Program Officer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitProfile {
    pub id: String,
    pub unit_number: String,
    pub college: String,
    pub district: String,
    pub program_officer: String,
    pub program_officer_email: String,
    pub program_officer_phone: Option<String>,
}
