//! Wire types of the LeetCode GraphQL API.
//!
//! Only the fields used to build a [`ProfileSummary`](crate::types::ProfileSummary) are
//! modelled. Everything the upstream may leave out is an `Option`, so that a partial response
//! still decodes and each field can be defaulted on its own.

use serde::{Deserialize, Serialize};

/// Profile, solved counts and contest ranking of one user.
pub const PROFILE_QUERY: &str = r#"
query getUserProfile($username: String!) {
    matchedUser(username: $username) {
        username
        submitStats {
            acSubmissionNum {
                difficulty
                count
            }
        }
        profile {
            ranking
            reputation
        }
    }
    userContestRanking(username: $username) {
        attendedContestsCount
        rating
        globalRanking
    }
}
"#;

/// Submission calendar and streak of one user.
pub const CALENDAR_QUERY: &str = r#"
query userProfileCalendar($username: String!) {
    matchedUser(username: $username) {
        userCalendar {
            activeYears
            streak
            totalActiveDays
            submissionCalendar
        }
    }
}
"#;

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
pub struct Variables<'a> {
    pub username: &'a str,
}

/// The response envelope: `data`, `errors`, or both.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

impl<T> GraphQlResponse<T> {
    /// Returns the joined error messages if the upstream reported any errors.
    ///
    /// The mere presence of the `errors` key counts as a rejection, even when the list is empty.
    pub fn rejection(&self) -> Option<String> {
        let errors = self.errors.as_ref()?;
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        if messages.is_empty() {
            Some("unspecified error".to_owned())
        } else {
            Some(messages.join("; "))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub matched_user: Option<MatchedUser>,
    pub user_contest_ranking: Option<ContestRanking>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedUser {
    pub username: Option<String>,
    pub submit_stats: Option<SubmitStats>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStats {
    pub ac_submission_num: Option<Vec<DifficultyCount>>,
}

#[derive(Debug, Deserialize)]
pub struct DifficultyCount {
    #[serde(default)]
    pub difficulty: String,
    pub count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    pub ranking: Option<u64>,
    pub reputation: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestRanking {
    pub attended_contests_count: Option<u32>,
    pub rating: Option<f64>,
    pub global_ranking: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarData {
    pub matched_user: Option<CalendarUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarUser {
    pub user_calendar: Option<UserCalendar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCalendar {
    pub active_years: Option<Vec<u16>>,
    pub streak: Option<u32>,
    pub total_active_days: Option<u32>,
    /// A JSON object encoded as a string, mapping epoch seconds to submission counts.
    pub submission_calendar: Option<String>,
}
