use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accepted submissions of one user, bucketed by problem difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedCounts {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl SolvedCounts {
    /// The number of solved problems across all difficulties.
    pub fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }
}

/// Contest statistics of a user who took part in at least one contest.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContestStats {
    pub rating: Option<f64>,
    pub attended: Option<u32>,
    pub global_ranking: Option<u64>,
}

/// Streak and activity figures from the submission calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activity {
    pub streak: u32,
    pub total_active_days: u32,
    pub active_years: Vec<u16>,
    pub submission_calendar: BTreeMap<String, u32>,
}

/// The flattened statistics of one profile, as served by the API.
///
/// A summary is built once from a complete fetch and never modified afterwards. Fields the
/// upstream did not report are `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub username: String,
    pub total_solved: u32,
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
    pub ranking: Option<u64>,
    pub reputation: Option<i64>,
    pub contest_rating: Option<f64>,
    pub contests_attended: u32,
    pub global_ranking: Option<u64>,
    pub streak: u32,
    pub total_active_days: u32,
    #[serde(default)]
    pub active_years: Vec<u16>,
    pub submission_calendar: BTreeMap<String, u32>,
}

impl ProfileSummary {
    /// Assembles a summary from its independently defaulted parts.
    ///
    /// `total_solved` is always derived from `solved`, so it can never disagree with the
    /// per-difficulty counts.
    pub fn new(
        username: impl Into<String>,
        solved: SolvedCounts,
        ranking: Option<u64>,
        reputation: Option<i64>,
        contest: Option<ContestStats>,
        activity: Activity,
    ) -> Self {
        let contest = contest.unwrap_or_default();

        Self {
            username: username.into(),
            total_solved: solved.total(),
            easy: solved.easy,
            medium: solved.medium,
            hard: solved.hard,
            ranking,
            reputation,
            contest_rating: contest.rating,
            contests_attended: contest.attended.unwrap_or(0),
            global_ranking: contest.global_ranking,
            streak: activity.streak,
            total_active_days: activity.total_active_days,
            active_years: activity.active_years,
            submission_calendar: activity.submission_calendar,
        }
    }
}
