//! CSV export of user and volunteer records
//!
//! Format: one unquoted header row, then one row per record. Every data
//! field is wrapped in double quotes, a double quote inside a value is
//! doubled, and line breaks stay inside the quoted field. Missing values
//! are written as `N/A`. Columns are separated by `,` and rows end in `\n`.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{ActivitySubmission, UnitProfile, UserProfile, VolunteerProfile};

pub const MISSING: &str = "N/A";

pub const USER_HEADER: &[&str] = &[
    "Email",
    "Name",
    "Role",
    "Phone",
    "Unit Number",
    "College",
    "District",
    "Applications",
    "Created At",
];

pub const VOLUNTEER_HEADER: &[&str] = &[
    "Email",
    "Name",
    "Unit Number",
    "Status",
    "Gender",
    "Date of Birth",
    "Blood Group",
    "District",
    "Pincode",
    "Languages",
    "Created At",
];

/// A record that can be written as one CSV row.
pub trait CsvRecord {
    fn header() -> &'static [&'static str];

    /// One entry per header column; `None` is written as [`MISSING`].
    fn fields(&self) -> Vec<Option<String>>;
}

pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn row(fields: Vec<Option<String>>) -> String {
    let cells: Vec<String> = fields
        .into_iter()
        .map(|f| match f {
            Some(v) if !v.is_empty() => quote(&v),
            _ => quote(MISSING),
        })
        .collect();
    cells.join(",")
}

pub fn to_csv<R: CsvRecord>(records: &[R]) -> String {
    let mut out = R::header().join(",");
    out.push('\n');
    for record in records {
        out.push_str(&row(record.fields()));
        out.push('\n');
    }
    out
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A user with the columns joined in from other tables.
#[derive(Debug, Clone)]
pub struct UserRow<'a> {
    pub profile: &'a UserProfile,
    pub unit_number: Option<&'a str>,
    pub applications: usize,
}

impl CsvRecord for UserRow<'_> {
    fn header() -> &'static [&'static str] {
        USER_HEADER
    }

    fn fields(&self) -> Vec<Option<String>> {
        let p = self.profile;
        vec![
            Some(p.email.clone()),
            Some(p.full_name.clone()),
            Some(p.role.to_string()),
            p.phone.clone(),
            self.unit_number.map(str::to_string),
            p.college.clone(),
            p.district.clone(),
            Some(self.applications.to_string()),
            Some(timestamp(&p.created_at)),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct VolunteerRow<'a> {
    pub profile: &'a VolunteerProfile,
    pub email: Option<&'a str>,
    pub unit_number: Option<&'a str>,
}

impl CsvRecord for VolunteerRow<'_> {
    fn header() -> &'static [&'static str] {
        VOLUNTEER_HEADER
    }

    fn fields(&self) -> Vec<Option<String>> {
        let p = self.profile;
        vec![
            self.email.map(str::to_string),
            Some(p.full_name.clone()),
            self.unit_number.map(str::to_string),
            Some(p.status.to_string()),
            Some(p.gender.clone()),
            Some(p.date_of_birth.format("%Y-%m-%d").to_string()),
            Some(p.blood_group.clone()),
            Some(p.district.clone()),
            Some(p.pincode.clone()),
            Some(p.languages_known.join(", ")),
            Some(timestamp(&p.created_at)),
        ]
    }
}

fn unit_numbers(units: &[UnitProfile]) -> HashMap<&str, &str> {
    units
        .iter()
        .map(|u| (u.id.as_str(), u.unit_number.as_str()))
        .collect()
}

/// Users export; `Applications` counts each user's activity submissions.
pub fn users_csv(
    users: &[UserProfile],
    units: &[UnitProfile],
    submissions: &[ActivitySubmission],
) -> String {
    let numbers = unit_numbers(units);
    let mut applications: HashMap<&str, usize> = HashMap::new();
    for s in submissions {
        *applications.entry(s.student_id.as_str()).or_default() += 1;
    }

    let rows: Vec<UserRow<'_>> = users
        .iter()
        .map(|profile| UserRow {
            profile,
            unit_number: profile
                .unit_id
                .as_deref()
                .and_then(|id| numbers.get(id).copied()),
            applications: applications.get(profile.id.as_str()).copied().unwrap_or(0),
        })
        .collect();
    to_csv(&rows)
}

pub fn volunteers_csv(
    volunteers: &[VolunteerProfile],
    users: &[UserProfile],
    units: &[UnitProfile],
) -> String {
    let numbers = unit_numbers(units);
    let emails: HashMap<&str, &str> = users
        .iter()
        .map(|u| (u.id.as_str(), u.email.as_str()))
        .collect();

    let rows: Vec<VolunteerRow<'_>> = volunteers
        .iter()
        .map(|profile| VolunteerRow {
            profile,
            email: emails.get(profile.user_id.as_str()).copied(),
            unit_number: numbers.get(profile.unit_id.as_str()).copied(),
        })
        .collect();
    to_csv(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn user(id: &str, phone: Option<&str>) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{}@college.edu", id),
            full_name: "Ravi Kumar".to_string(),
            role: Role::Student,
            unit_id: Some("unit-1".to_string()),
            phone: phone.map(str::to_string),
            college: Some("Govt College".to_string()),
            district: None,
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap(),
        }
    }

    fn unit() -> UnitProfile {
        UnitProfile {
            id: "unit-1".to_string(),
            unit_number: "NSS-042".to_string(),
            college: "Govt College".to_string(),
            district: "Pune".to_string(),
            program_officer: "Dr. Rao".to_string(),
            program_officer_email: "rao@college.edu".to_string(),
            program_officer_phone: None,
        }
    }

    #[test]
    fn missing_phone_is_na() {
        let csv = users_csv(
            &[user("a", Some("9876543210")), user("b", None)],
            &[unit()],
            &[],
        );
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Email,Name,Role,Phone,Unit Number,College,District,Applications,Created At",
                "\"a@college.edu\",\"Ravi Kumar\",\"student\",\"9876543210\",\"NSS-042\",\"Govt College\",\"N/A\",\"0\",\"2024-02-01T09:30:00Z\"",
                "\"b@college.edu\",\"Ravi Kumar\",\"student\",\"N/A\",\"NSS-042\",\"Govt College\",\"N/A\",\"0\",\"2024-02-01T09:30:00Z\"",
            ]
        );
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn quotes_are_doubled_and_newlines_kept() {
        let mut u = user("a", None);
        u.full_name = "Ravi \"RK\" Kumar".to_string();
        u.college = Some("Govt College\nEast Campus".to_string());
        let csv = users_csv(&[u], &[], &[]);
        assert!(csv.contains("\"Ravi \"\"RK\"\" Kumar\""));
        assert!(csv.contains("\"Govt College\nEast Campus\""));
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(
            volunteers_csv(&[], &[], &[]),
            "Email,Name,Unit Number,Status,Gender,Date of Birth,Blood Group,District,Pincode,Languages,Created At\n"
        );
    }
}
