//! Flattening of the two query results into a [`ProfileSummary`].

use std::collections::BTreeMap;

use crate::types::{Activity, ContestStats, ProfileSummary, SolvedCounts};

use super::graphql::{CalendarData, ContestRanking, ProfileData, SubmitStats, UserCalendar};

/// Builds the summary for `username`.
///
/// Returns `None` if the profile query did not match any user. Every other missing piece is
/// defaulted on its own: the profile object, the contest ranking and the calendar.
pub fn build_summary(
    username: &str,
    profile: ProfileData,
    calendar: CalendarData,
) -> Option<ProfileSummary> {
    let user = profile.matched_user?;
    let (ranking, reputation) = match user.profile {
        Some(profile) => (profile.ranking, profile.reputation),
        None => (None, None),
    };

    let user_calendar = calendar
        .matched_user
        .and_then(|user| user.user_calendar);

    Some(ProfileSummary::new(
        username,
        solved_counts(user.submit_stats),
        ranking,
        reputation,
        profile.user_contest_ranking.map(contest_stats),
        activity(username, user_calendar),
    ))
}

/// Picks the easy, medium and hard buckets out of the accepted submissions.
///
/// Other buckets, such as the `All` aggregate the upstream also returns, are ignored.
fn solved_counts(stats: Option<SubmitStats>) -> SolvedCounts {
    let mut solved = SolvedCounts::default();
    let buckets = stats.and_then(|s| s.ac_submission_num).unwrap_or_default();

    for bucket in buckets {
        let count = bucket.count.unwrap_or(0);
        match bucket.difficulty.as_str() {
            "Easy" => solved.easy = count,
            "Medium" => solved.medium = count,
            "Hard" => solved.hard = count,
            _ => {}
        }
    }

    solved
}

fn contest_stats(ranking: ContestRanking) -> ContestStats {
    ContestStats {
        rating: ranking.rating,
        attended: ranking.attended_contests_count,
        global_ranking: ranking.global_ranking,
    }
}

fn activity(username: &str, calendar: Option<UserCalendar>) -> Activity {
    let Some(calendar) = calendar else {
        return Activity::default();
    };

    let submission_calendar = match calendar.submission_calendar.as_deref() {
        None | Some("") => BTreeMap::new(),
        Some(raw) => parse_submission_calendar(raw).unwrap_or_else(|error| {
            metric!(counter("upstream.calendar_malformed") += 1);
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                username,
                "discarding malformed submission calendar"
            );
            BTreeMap::new()
        }),
    };

    Activity {
        streak: calendar.streak.unwrap_or(0),
        total_active_days: calendar.total_active_days.unwrap_or(0),
        active_years: calendar.active_years.unwrap_or_default(),
        submission_calendar,
    }
}

/// Decodes the submission calendar, which the upstream sends as a JSON document inside a
/// string field.
fn parse_submission_calendar(raw: &str) -> Result<BTreeMap<String, u32>, serde_json::Error> {
    serde_json::from_str(raw)
}
