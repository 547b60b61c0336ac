use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NightId = u64;
pub type SubmissionId = u64;

pub const DEFAULT_THEMES: &[&str] = &[
    "Time Travel",
    "Heist",
    "Sports",
    "Musicals",
    "Sci-Fi",
    "Horror",
    "Rom-Com",
    "Based on a Book",
    "Foreign Language",
    "Documentaries",
    "Animated",
    "Film Noir",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieNight {
    pub id: NightId,
    pub theme: String,
    pub date: String,
    pub submissions: Vec<Submission>,
    pub eliminated: Vec<SubmissionId>,
    pub winner: Option<SubmissionId>,
    pub reviews: Vec<Review>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: SubmissionId,
    pub title: String,
    pub user_id: String,
    pub votes: i64,
    /// Direction of every vote currently held, by voter.
    pub voters: BTreeMap<String, Vote>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn delta(self) -> i64 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    pub id: u64,
    pub user_id: String,
    pub rating: Rating,
    pub comment: String,
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
}

/// A phone number someone left for reminders. Nothing is ever sent to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: u64,
    pub user_id: String,
    pub phone: String,
}

/// Where a night stands, derived from its submissions, eliminations and reviews.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    OpenForSubmissions,
    Deciding,
    Decided,
    Reviewed,
}

/// Everything that is written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nights: Vec<MovieNight>,
    pub themes: Vec<String>,
    pub reminders: Vec<Reminder>,
    pub current_user: Option<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            nights: Vec::new(),
            themes: DEFAULT_THEMES.iter().map(|t| t.to_string()).collect(),
            reminders: Vec::new(),
            current_user: None,
        }
    }
}
