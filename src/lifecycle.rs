//! The movie night state machine.
//!
//! Every operation takes the current list and returns a new one. Rule violations
//! (a second submission by the same user, eliminating an empty night, ...) leave the
//! list unchanged instead of failing.

use crate::model::*;
use rand::seq::SliceRandom;
use rand::Rng;

fn map_night<F>(nights: &[MovieNight], night_id: NightId, f: F) -> Vec<MovieNight>
where
    F: FnOnce(&MovieNight) -> MovieNight,
{
    let mut f = Some(f);
    nights
        .iter()
        .map(|night| {
            if night.id == night_id {
                if let Some(f) = f.take() {
                    return f(night);
                }
            }
            night.clone()
        })
        .collect()
}

fn map_submission<F>(night: &MovieNight, movie_id: SubmissionId, f: F) -> MovieNight
where
    F: Fn(&Submission) -> Submission,
{
    MovieNight {
        submissions: night
            .submissions
            .iter()
            .map(|s| if s.id == movie_id { f(s) } else { s.clone() })
            .collect(),
        ..night.clone()
    }
}

pub fn create_night(nights: &[MovieNight], id: NightId, theme: &str, date: &str) -> Vec<MovieNight> {
    let night = MovieNight {
        id,
        theme: theme.to_owned(),
        date: date.to_owned(),
        submissions: Vec::new(),
        eliminated: Vec::new(),
        winner: None,
        reviews: Vec::new(),
    };
    std::iter::once(night).chain(nights.iter().cloned()).collect()
}

pub fn update_date(nights: &[MovieNight], night_id: NightId, date: &str) -> Vec<MovieNight> {
    map_night(nights, night_id, |night| MovieNight {
        date: date.to_owned(),
        ..night.clone()
    })
}

pub fn add_submission(
    nights: &[MovieNight],
    night_id: NightId,
    id: SubmissionId,
    title: &str,
    user: &str,
) -> Vec<MovieNight> {
    map_night(nights, night_id, |night| {
        let mut night = night.clone();
        if night.submission_of(user).is_none() {
            night.submissions.push(Submission {
                id,
                title: title.to_owned(),
                user_id: user.to_owned(),
                votes: 0,
                voters: Default::default(),
            });
        }
        night
    })
}

pub fn update_submission(
    nights: &[MovieNight],
    night_id: NightId,
    movie_id: SubmissionId,
    title: &str,
) -> Vec<MovieNight> {
    map_night(nights, night_id, |night| {
        map_submission(night, movie_id, |s| Submission {
            title: title.to_owned(),
            ..s.clone()
        })
    })
}

pub fn delete_submission(
    nights: &[MovieNight],
    night_id: NightId,
    movie_id: SubmissionId,
) -> Vec<MovieNight> {
    map_night(nights, night_id, |night| MovieNight {
        submissions: night
            .submissions
            .iter()
            .filter(|s| s.id != movie_id)
            .cloned()
            .collect(),
        eliminated: night
            .eliminated
            .iter()
            .copied()
            .filter(|id| *id != movie_id)
            .collect(),
        ..night.clone()
    })
}

/// Casts, retracts or flips `user`'s vote on a submission.
///
/// Voting again in the direction already held retracts that vote. Voting in the
/// other direction replaces it, so the count moves by two.
pub fn vote(
    nights: &[MovieNight],
    night_id: NightId,
    movie_id: SubmissionId,
    vote: Vote,
    user: &str,
) -> Vec<MovieNight> {
    map_night(nights, night_id, |night| {
        map_submission(night, movie_id, |s| {
            let mut s = s.clone();
            match s.voters.remove(user) {
                Some(previous) if previous == vote => s.votes -= previous.delta(),
                Some(previous) => {
                    s.votes += vote.delta() - previous.delta();
                    s.voters.insert(user.to_owned(), vote);
                }
                None => {
                    s.votes += vote.delta();
                    s.voters.insert(user.to_owned(), vote);
                }
            }
            s
        })
    })
}

/// One turn of the elimination wheel.
///
/// With several active submissions, one picked uniformly at random is eliminated,
/// and if that leaves a single one it becomes the winner in the same turn. A lone
/// active submission wins straight away. A night that already has a winner or has
/// no active submissions is left alone.
pub fn eliminate_one<R>(nights: &[MovieNight], night_id: NightId, rng: &mut R) -> Vec<MovieNight>
where
    R: Rng + ?Sized,
{
    map_night(nights, night_id, |night| {
        let mut night = night.clone();
        if night.winner.is_some() {
            return night;
        }
        let active: Vec<SubmissionId> = night.active_submissions().map(|s| s.id).collect();
        match active.as_slice() {
            [] => {}
            [last] => night.winner = Some(*last),
            _ => {
                if let Some(&out) = active.choose(rng) {
                    log::debug!("night {}: eliminated submission {}", night.id, out);
                    night.eliminated.push(out);
                    if let [a, b] = active.as_slice() {
                        night.winner = Some(if *a == out { *b } else { *a });
                    }
                }
            }
        }
        night
    })
}

pub fn add_review(
    nights: &[MovieNight],
    night_id: NightId,
    id: u64,
    rating: Rating,
    comment: &str,
    user: &str,
    date: &str,
) -> Vec<MovieNight> {
    map_night(nights, night_id, |night| {
        let mut night = night.clone();
        night.reviews.push(Review {
            id,
            user_id: user.to_owned(),
            rating,
            comment: comment.to_owned(),
            date: date.to_owned(),
        });
        night
    })
}

/// The first night still waiting for a winner.
pub fn upcoming_night(nights: &[MovieNight]) -> Option<&MovieNight> {
    nights.iter().find(|n| n.winner.is_none())
}

pub fn past_nights(nights: &[MovieNight]) -> impl Iterator<Item = &MovieNight> {
    nights.iter().filter(|n| n.winner.is_some())
}

pub fn add_theme(themes: &[String], theme: &str) -> Vec<String> {
    let mut themes = themes.to_vec();
    if !theme.is_empty() {
        themes.push(theme.to_owned());
    }
    themes
}

pub fn update_theme(themes: &[String], old: &str, new: &str) -> Vec<String> {
    themes
        .iter()
        .map(|t| if t == old { new.to_owned() } else { t.clone() })
        .collect()
}

pub fn delete_theme(themes: &[String], theme: &str) -> Vec<String> {
    themes.iter().filter(|t| *t != theme).cloned().collect()
}

pub fn add_reminder(reminders: &[Reminder], id: u64, user: &str, phone: &str) -> Vec<Reminder> {
    let mut reminders = reminders.to_vec();
    if !phone.is_empty() {
        reminders.push(Reminder {
            id,
            user_id: user.to_owned(),
            phone: phone.to_owned(),
        });
    }
    reminders
}

pub fn remove_reminder(reminders: &[Reminder], id: u64) -> Vec<Reminder> {
    reminders.iter().filter(|r| r.id != id).cloned().collect()
}

pub fn reminder_of<'a>(reminders: &'a [Reminder], user: &str) -> Option<&'a Reminder> {
    reminders.iter().find(|r| r.user_id == user)
}

impl MovieNight {
    pub fn is_eliminated(&self, movie_id: SubmissionId) -> bool {
        self.eliminated.contains(&movie_id)
    }

    pub fn active_submissions(&self) -> impl Iterator<Item = &Submission> {
        self.submissions
            .iter()
            .filter(move |s| !self.is_eliminated(s.id))
    }

    pub fn can_spin(&self) -> bool {
        self.winner.is_none() && self.active_submissions().count() > 1
    }

    pub fn winning_submission(&self) -> Option<&Submission> {
        let winner = self.winner?;
        self.submissions.iter().find(|s| s.id == winner)
    }

    pub fn submission_of(&self, user: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.user_id == user)
    }

    pub fn review_of(&self, user: &str) -> Option<&Review> {
        self.reviews.iter().find(|r| r.user_id == user)
    }

    pub fn phase(&self) -> Phase {
        match (self.winner, self.reviews.is_empty(), self.eliminated.is_empty()) {
            (Some(_), false, _) => Phase::Reviewed,
            (Some(_), true, _) => Phase::Decided,
            (None, _, false) => Phase::Deciding,
            (None, _, true) => Phase::OpenForSubmissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NIGHT: NightId = 1;

    fn night_with(titles: &[(&str, &str)]) -> Vec<MovieNight> {
        let mut nights = create_night(&[], NIGHT, "Heist", "1/1/2026");
        for (i, (user, title)) in titles.iter().enumerate() {
            nights = add_submission(&nights, NIGHT, 100 + i as u64, title, user);
        }
        nights
    }

    #[test]
    fn create_night_prepends() {
        let nights = create_night(&[], 1, "Heist", "1/1/2026");
        let nights = create_night(&nights, 2, "Horror", "2/1/2026");
        assert_eq!(nights.len(), 2);
        assert_eq!(nights[0].id, 2);
        assert_eq!(nights[0].theme, "Horror");
        assert!(nights[0].submissions.is_empty());
        assert_eq!(nights[0].winner, None);
        assert_eq!(nights[0].phase(), Phase::OpenForSubmissions);
    }

    #[test]
    fn update_date_only_touches_target() {
        let nights = create_night(&[], 1, "Heist", "1/1/2026");
        let nights = create_night(&nights, 2, "Horror", "2/1/2026");
        let nights = update_date(&nights, 1, "next friday");
        assert_eq!(nights[1].date, "next friday");
        assert_eq!(nights[0].date, "2/1/2026");
    }

    #[test]
    fn only_first_submission_per_user_counts() {
        let mut nights = night_with(&[("alice", "Heat")]);
        for i in 0..5 {
            nights = add_submission(&nights, NIGHT, 200 + i, "Ronin", "alice");
        }
        let night = &nights[0];
        assert_eq!(night.submissions.len(), 1);
        assert_eq!(night.submissions[0].title, "Heat");
        assert_eq!(night.submissions[0].votes, 0);
    }

    #[test]
    fn edit_and_delete_submission() {
        let nights = night_with(&[("alice", "Heat"), ("bob", "Inside Man")]);
        let nights = update_submission(&nights, NIGHT, 100, "Heat (1995)");
        assert_eq!(nights[0].submissions[0].title, "Heat (1995)");
        assert_eq!(nights[0].submissions[1].title, "Inside Man");

        let nights = delete_submission(&nights, NIGHT, 100);
        assert_eq!(nights[0].submissions.len(), 1);
        assert_eq!(nights[0].submissions[0].user_id, "bob");
        // alice may submit again once hers is gone
        let nights = add_submission(&nights, NIGHT, 300, "Ronin", "alice");
        assert_eq!(nights[0].submissions.len(), 2);
    }

    #[test]
    fn deleting_an_eliminated_submission_forgets_it() {
        let mut rng = StdRng::seed_from_u64(11);
        let nights = night_with(&[("alice", "Heat"), ("bob", "Inside Man"), ("carol", "Ronin")]);
        let nights = eliminate_one(&nights, NIGHT, &mut rng);
        let out = nights[0].eliminated[0];
        let nights = delete_submission(&nights, NIGHT, out);
        assert!(nights[0].eliminated.is_empty());
        assert_eq!(nights[0].submissions.len(), 2);
        assert!(nights[0].can_spin());
    }

    #[test]
    fn last_elimination_decides_in_the_same_turn() {
        let mut rng = StdRng::seed_from_u64(4);
        let nights = night_with(&[("alice", "Heat"), ("bob", "Inside Man")]);
        let nights = eliminate_one(&nights, NIGHT, &mut rng);
        let night = &nights[0];
        assert_eq!(night.eliminated.len(), 1);
        let winner = night.winner.unwrap();
        assert!(!night.is_eliminated(winner));
        assert_eq!(night.phase(), Phase::Decided);
    }

    #[test]
    fn voting_twice_in_same_direction_is_undone() {
        let before = night_with(&[("alice", "Heat")]);
        for &direction in &[Vote::Up, Vote::Down] {
            let once = vote(&before, NIGHT, 100, direction, "bob");
            assert_eq!(once[0].submissions[0].votes, direction.delta());
            assert_eq!(once[0].submissions[0].voters.get("bob"), Some(&direction));
            let twice = vote(&once, NIGHT, 100, direction, "bob");
            assert_eq!(twice, before);
        }
    }

    #[test]
    fn opposite_vote_flips() {
        let nights = night_with(&[("alice", "Heat")]);
        let nights = vote(&nights, NIGHT, 100, Vote::Up, "bob");
        let nights = vote(&nights, NIGHT, 100, Vote::Down, "bob");
        let s = &nights[0].submissions[0];
        assert_eq!(s.votes, -1);
        assert_eq!(s.voters.get("bob"), Some(&Vote::Down));
        assert_eq!(s.voters.len(), 1);
    }

    #[test]
    fn votes_from_several_users_add_up() {
        let nights = night_with(&[("alice", "Heat")]);
        let nights = vote(&nights, NIGHT, 100, Vote::Down, "bob");
        let nights = vote(&nights, NIGHT, 100, Vote::Down, "carol");
        let nights = vote(&nights, NIGHT, 100, Vote::Up, "dave");
        assert_eq!(nights[0].submissions[0].votes, -1);
        assert_eq!(nights[0].submissions[0].voters.len(), 3);
    }

    #[test]
    fn empty_night_never_decides() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut nights = night_with(&[]);
        for _ in 0..10 {
            nights = eliminate_one(&nights, NIGHT, &mut rng);
        }
        assert_eq!(nights[0].winner, None);
        assert!(nights[0].eliminated.is_empty());
    }

    #[test]
    fn single_submission_wins_immediately() {
        let mut rng = StdRng::seed_from_u64(7);
        let nights = night_with(&[("alice", "Heat")]);
        let nights = eliminate_one(&nights, NIGHT, &mut rng);
        assert_eq!(nights[0].winner, Some(100));
        assert!(nights[0].eliminated.is_empty());
        assert_eq!(nights[0].phase(), Phase::Decided);
    }

    #[test]
    fn elimination_terminates() {
        let users = ["a", "b", "c", "d", "e", "f"];
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let entries: Vec<(&str, &str)> = users.iter().map(|u| (*u, *u)).collect();
            let mut nights = night_with(&entries);
            let n = users.len();
            let mut calls = 0;
            while nights[0].winner.is_none() {
                nights = eliminate_one(&nights, NIGHT, &mut rng);
                calls += 1;
                assert!(nights[0].eliminated.len() <= n - 1);
                assert!(calls <= n - 1);
            }
            let night = &nights[0];
            assert_eq!(night.eliminated.len(), n - 1);
            let winner = night.winner.unwrap();
            assert!(!night.is_eliminated(winner));
            assert!(night.submissions.iter().any(|s| s.id == winner));

            let after = eliminate_one(&nights, NIGHT, &mut rng);
            assert_eq!(&after, &nights);
        }
    }

    #[test]
    fn phases_follow_the_wheel() {
        let mut rng = StdRng::seed_from_u64(3);
        let nights = night_with(&[("alice", "Heat"), ("bob", "Inside Man"), ("carol", "Ronin")]);
        assert_eq!(nights[0].phase(), Phase::OpenForSubmissions);
        assert!(nights[0].can_spin());
        let nights = eliminate_one(&nights, NIGHT, &mut rng);
        assert_eq!(nights[0].phase(), Phase::Deciding);
        assert!(nights[0].can_spin());
        let nights = eliminate_one(&nights, NIGHT, &mut rng);
        assert_eq!(nights[0].phase(), Phase::Decided);
        assert!(!nights[0].can_spin());
        let nights = add_review(&nights, NIGHT, 9, Rating::Down, "", "carol", "1/2/2026");
        assert_eq!(nights[0].phase(), Phase::Reviewed);
    }

    #[test]
    fn heist_night() {
        let mut rng = StdRng::seed_from_u64(42);
        let nights = create_night(&[], NIGHT, "Heist", "1/1/2026");
        let nights = add_submission(&nights, NIGHT, 10, "Heat", "A");
        let nights = add_submission(&nights, NIGHT, 11, "Inside Man", "B");
        let mut nights = vote(&nights, NIGHT, 10, Vote::Up, "B");
        assert_eq!(nights[0].submissions[0].votes, 1);

        while nights[0].winner.is_none() {
            nights = eliminate_one(&nights, NIGHT, &mut rng);
        }
        let night = &nights[0];
        assert_eq!(night.eliminated.len(), 1);
        let remaining: Vec<_> = night.active_submissions().map(|s| s.id).collect();
        assert_eq!(remaining, vec![night.winner.unwrap()]);

        let nights = add_review(&nights, NIGHT, 20, Rating::Up, "Great pick", "A", "1/2/2026");
        let reviews = &nights[0].reviews;
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].user_id, "A");
        assert_eq!(reviews[0].rating, Rating::Up);
        assert_eq!(reviews[0].comment, "Great pick");
        assert_eq!(nights[0].review_of("A"), Some(&reviews[0]));
    }

    #[test]
    fn upcoming_and_past() {
        let mut rng = StdRng::seed_from_u64(1);
        let nights = create_night(&[], 1, "Heist", "d");
        let nights = add_submission(&nights, 1, 10, "Heat", "A");
        let nights = eliminate_one(&nights, 1, &mut rng);
        let nights = create_night(&nights, 2, "Horror", "d");
        assert_eq!(upcoming_night(&nights).map(|n| n.id), Some(2));
        let past: Vec<_> = past_nights(&nights).map(|n| n.id).collect();
        assert_eq!(past, vec![1]);
        assert_eq!(nights[1].winning_submission().map(|s| s.title.as_str()), Some("Heat"));
    }

    #[test]
    fn theme_list() {
        let themes = vec!["Heist".to_owned(), "Horror".to_owned()];
        let themes = add_theme(&themes, "");
        assert_eq!(themes.len(), 2);
        let themes = add_theme(&themes, "Heist");
        assert_eq!(themes, ["Heist", "Horror", "Heist"]);
        let themes = update_theme(&themes, "Heist", "Capers");
        assert_eq!(themes, ["Capers", "Horror", "Capers"]);
        let themes = delete_theme(&themes, "Capers");
        assert_eq!(themes, ["Horror"]);
    }

    #[test]
    fn reminder_list() {
        let reminders = add_reminder(&[], 1, "alice", "");
        assert!(reminders.is_empty());
        let reminders = add_reminder(&reminders, 1, "alice", "555-0100");
        let reminders = add_reminder(&reminders, 2, "bob", "555-0101");
        assert_eq!(reminder_of(&reminders, "bob").map(|r| r.id), Some(2));
        let reminders = remove_reminder(&reminders, 1);
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminder_of(&reminders, "alice"), None);
    }
}
