//! Vote aggregation.
//!
//! Turns a poll's raw vote set into per-option counts, percentages and voter
//! lists. Pure: the same inputs always produce the same result.

use std::collections::BTreeSet;

use pollcast_common::config::AvatarConfig;
use pollcast_db::entities::poll::PollOption;
use serde::Serialize;

use super::vote_store::{RawVoteSet, VoteRecord};

/// Name shown for voters without any stored name.
pub const ANONYMOUS: &str = "Anonymous";

/// A voter as displayed next to an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

/// Tally for one option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option_id: String,
    pub text: String,
    pub votes: usize,
    /// `0.0..=100.0`; always 0 when the poll has no votes.
    pub percentage: f64,
    pub voters: Vec<Voter>,
}

/// Derived view of a poll's votes. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub poll_id: String,
    pub total_votes: usize,
    /// Parallel to the poll's options.
    pub options: Vec<OptionTally>,
}

/// Produces an avatar for voters who never set one.
pub trait AvatarPolicy: Send + Sync {
    /// Placeholder avatar reference for a voter called `name`.
    fn placeholder(&self, name: &str) -> String;
}

/// Initial-letter avatars from a ui-avatars compatible service.
#[derive(Debug, Clone)]
pub struct PlaceholderAvatarPolicy {
    base_url: String,
    background: String,
    color: String,
    size: u32,
}

impl PlaceholderAvatarPolicy {
    /// Build from configuration.
    #[must_use]
    pub fn from_config(config: &AvatarConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            background: config.background.clone(),
            color: config.color.clone(),
            size: config.size,
        }
    }
}

impl Default for PlaceholderAvatarPolicy {
    fn default() -> Self {
        Self::from_config(&AvatarConfig::default())
    }
}

impl AvatarPolicy for PlaceholderAvatarPolicy {
    fn placeholder(&self, name: &str) -> String {
        let initial: String = name.chars().take(1).collect();
        format!(
            "{}?name={}&background={}&color={}&size={}&bold=true",
            self.base_url,
            urlencoding::encode(&initial),
            self.background,
            self.color,
            self.size
        )
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Resolve how a vote record's author is displayed.
#[must_use]
pub fn resolve_voter(record: &VoteRecord, avatar_policy: &dyn AvatarPolicy) -> Voter {
    let name = non_empty(record.display_name.as_ref())
        .or_else(|| non_empty(record.legacy_name.as_ref()))
        .unwrap_or(ANONYMOUS)
        .to_string();

    let avatar = non_empty(record.avatar_ref.as_ref())
        .or_else(|| non_empty(record.legacy_avatar.as_ref()))
        .map_or_else(|| avatar_policy.placeholder(&name), str::to_string);

    Voter {
        id: record.user_id.clone(),
        name,
        avatar,
    }
}

/// Aggregate a poll's raw votes against its option list.
///
/// Votes under option ids the poll does not define are ignored. Voters are
/// listed oldest vote first, ties broken by user id.
#[must_use]
pub fn aggregate(
    poll_id: &str,
    options: &[PollOption],
    raw: &RawVoteSet,
    avatar_policy: &dyn AvatarPolicy,
) -> AggregateResult {
    let count = |option_id: &str| raw.get(option_id).map_or(0, |voters| voters.len());

    let known: BTreeSet<&str> = options.iter().map(|o| o.id.as_str()).collect();
    let total_votes: usize = known.iter().map(|id| count(*id)).sum();

    let options = options
        .iter()
        .map(|option| {
            let votes = count(option.id.as_str());
            let percentage = if total_votes > 0 {
                votes as f64 * 100.0 / total_votes as f64
            } else {
                0.0
            };

            let mut records: Vec<&VoteRecord> = raw
                .get(&option.id)
                .map(|voters| voters.values().collect())
                .unwrap_or_default();
            records.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.user_id.cmp(&b.user_id))
            });

            OptionTally {
                option_id: option.id.clone(),
                text: option.text.clone(),
                votes,
                percentage,
                voters: records
                    .into_iter()
                    .map(|record| resolve_voter(record, avatar_policy))
                    .collect(),
            }
        })
        .collect();

    AggregateResult {
        poll_id: poll_id.to_string(),
        total_votes,
        options,
    }
}
