//! Role dashboards
//!
//! The projections are pure functions over fetched records and are
//! recomputed on every fetch.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    ActivityKind, ActivitySubmission, SubmissionStatus, UserProfile, VolunteerProfile,
    VolunteerStatus,
};
use crate::role::Role;
use crate::session::UserSession;
use crate::store::{ProfileFilter, SharedStore, SubmissionFilter, VolunteerFilter};

pub const RECENT_SUBMISSIONS: usize = 5;
pub const TOP_CONTRIBUTORS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub certified: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected + self.certified
    }

    pub fn of_volunteers<'a>(profiles: impl IntoIterator<Item = &'a VolunteerProfile>) -> Self {
        profiles
            .into_iter()
            .fold(Self::default(), |mut counts, p| {
                match p.status {
                    VolunteerStatus::Pending => counts.pending += 1,
                    VolunteerStatus::Approved => counts.approved += 1,
                    VolunteerStatus::Rejected => counts.rejected += 1,
                    VolunteerStatus::Certified => counts.certified += 1,
                }
                counts
            })
    }

    /// Submissions have no `certified` state; that count stays zero.
    pub fn of_submissions<'a>(
        submissions: impl IntoIterator<Item = &'a ActivitySubmission>,
    ) -> Self {
        submissions
            .into_iter()
            .fold(Self::default(), |mut counts, s| {
                match s.status {
                    SubmissionStatus::Pending => counts.pending += 1,
                    SubmissionStatus::Approved => counts.approved += 1,
                    SubmissionStatus::Rejected => counts.rejected += 1,
                }
                counts
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub blood_donation: usize,
    pub tree_tagging: usize,
}

impl KindCounts {
    fn of<'a>(submissions: impl IntoIterator<Item = &'a ActivitySubmission>) -> Self {
        submissions
            .into_iter()
            .fold(Self::default(), |mut counts, s| {
                match s.kind {
                    ActivityKind::BloodDonation => counts.blood_donation += 1,
                    ActivityKind::TreeTagging => counts.tree_tagging += 1,
                }
                counts
            })
    }
}

fn total_points<'a>(submissions: impl IntoIterator<Item = &'a ActivitySubmission>) -> u32 {
    submissions.into_iter().map(|s| s.awarded_points()).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDashboard {
    pub volunteer_status: Option<VolunteerStatus>,
    pub can_submit: bool,
    pub submissions: KindCounts,
    pub total_points: u32,
    pub recent: Vec<ActivitySubmission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contributor {
    pub student_id: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitDashboard {
    pub unit_id: String,
    pub volunteers: StatusCounts,
    pub submissions: StatusCounts,
    pub pending_reviews: usize,
    pub total_points: u32,
    pub top_contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub users_by_role: BTreeMap<Role, usize>,
    pub volunteers: StatusCounts,
    pub submissions: StatusCounts,
    pub points_by_unit: BTreeMap<String, u32>,
}

/// The dashboard for whichever role is signed in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Student(StudentDashboard),
    Unit(UnitDashboard),
    Admin(AdminDashboard),
}

/// `submissions` must be newest first.
pub fn student_dashboard(
    volunteer: Option<&VolunteerProfile>,
    submissions: &[ActivitySubmission],
) -> StudentDashboard {
    let volunteer_status = volunteer.map(|v| v.status);
    StudentDashboard {
        volunteer_status,
        can_submit: volunteer_status.map_or(false, |s| s.can_submit_activities()),
        submissions: KindCounts::of(submissions),
        total_points: total_points(submissions),
        recent: submissions.iter().take(RECENT_SUBMISSIONS).cloned().collect(),
    }
}

pub fn unit_dashboard(
    unit_id: &str,
    volunteers: &[VolunteerProfile],
    submissions: &[ActivitySubmission],
) -> UnitDashboard {
    let submission_counts = StatusCounts::of_submissions(submissions);

    let mut per_student: BTreeMap<&str, u32> = BTreeMap::new();
    for s in submissions.iter().filter(|s| s.awarded_points() > 0) {
        *per_student.entry(s.student_id.as_str()).or_default() += s.awarded_points();
    }
    let mut top_contributors: Vec<Contributor> = per_student
        .into_iter()
        .map(|(student_id, points)| Contributor {
            student_id: student_id.to_string(),
            points,
        })
        .collect();
    // highest first, ties by id so the order is stable
    top_contributors.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    top_contributors.truncate(TOP_CONTRIBUTORS);

    UnitDashboard {
        unit_id: unit_id.to_string(),
        volunteers: StatusCounts::of_volunteers(volunteers),
        submissions: submission_counts,
        pending_reviews: submission_counts.pending,
        total_points: total_points(submissions),
        top_contributors,
    }
}

pub fn admin_dashboard(
    users: &[UserProfile],
    volunteers: &[VolunteerProfile],
    submissions: &[ActivitySubmission],
) -> AdminDashboard {
    let mut users_by_role: BTreeMap<Role, usize> = Role::ALL.iter().map(|r| (*r, 0)).collect();
    for user in users {
        *users_by_role.entry(user.role).or_default() += 1;
    }

    let mut points_by_unit: BTreeMap<String, u32> = BTreeMap::new();
    for s in submissions {
        *points_by_unit.entry(s.unit_id.clone()).or_default() += s.awarded_points();
    }

    AdminDashboard {
        users_by_role,
        volunteers: StatusCounts::of_volunteers(volunteers),
        submissions: StatusCounts::of_submissions(submissions),
        points_by_unit,
    }
}

#[derive(Clone)]
pub struct DashboardService {
    store: SharedStore,
}

impl DashboardService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn load(&self, session: &UserSession) -> Result<Dashboard> {
        debug!(user_id = session.user_id(), role = %session.role(), "loading dashboard");
        match session.role() {
            Role::Student => self.student(session).await.map(Dashboard::Student),
            Role::Unit => self.unit(session).await.map(Dashboard::Unit),
            Role::Admin => self.admin(session).await.map(Dashboard::Admin),
        }
    }

    pub async fn student(&self, session: &UserSession) -> Result<StudentDashboard> {
        session
            .identity()
            .require(&[Role::Student], "view the student dashboard")?;
        let auth = session.auth();
        let volunteer = self
            .store
            .volunteer_profile_for_user(auth, session.user_id())
            .await?;
        let submissions = self
            .store
            .list_submissions(
                auth,
                &SubmissionFilter {
                    student_id: Some(session.user_id().to_string()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(student_dashboard(volunteer.as_ref(), &submissions))
    }

    pub async fn unit(&self, session: &UserSession) -> Result<UnitDashboard> {
        session
            .identity()
            .require(&[Role::Unit], "view the unit dashboard")?;
        let unit_id = session
            .unit_id()
            .ok_or_else(|| Error::unauthorized("unit account has no unit affiliation"))?;
        let auth = session.auth();

        let volunteers = self
            .store
            .list_volunteer_profiles(
                auth,
                &VolunteerFilter {
                    unit_id: Some(unit_id.to_string()),
                    status: None,
                },
            )
            .await?;
        let submissions = self
            .store
            .list_submissions(
                auth,
                &SubmissionFilter {
                    unit_id: Some(unit_id.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(unit_dashboard(unit_id, &volunteers, &submissions))
    }

    pub async fn admin(&self, session: &UserSession) -> Result<AdminDashboard> {
        session
            .identity()
            .require(&[Role::Admin], "view the admin dashboard")?;
        let auth = session.auth();

        let users = self
            .store
            .list_user_profiles(auth, &ProfileFilter::default())
            .await?;
        let volunteers = self
            .store
            .list_volunteer_profiles(auth, &VolunteerFilter::default())
            .await?;
        let submissions = self
            .store
            .list_submissions(auth, &SubmissionFilter::default())
            .await?;
        Ok(admin_dashboard(&users, &volunteers, &submissions))
    }
}
