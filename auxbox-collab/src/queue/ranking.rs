use std::collections::HashMap;

use crate::{SongData, SongId};

/// Aggregate vote counts for one song.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub up: u32,
    pub down: u32,
}

impl Tally {
    pub fn score(&self) -> i64 {
        self.up as i64 - self.down as i64
    }
}

/// Computes the display and play order of a queue.
///
/// The sort key, strictly in this order: unplayed before played, then
/// score (up minus down) descending, then creation time descending.
/// Newest-first on ties is the intended policy, not an accident. Song id
/// breaks exact timestamp ties so the order is a total order.
pub fn rank(items: &[SongData], tallies: &HashMap<SongId, Tally>) -> Vec<SongData> {
    let score = |song: &SongData| tallies.get(&song.id).copied().unwrap_or_default().score();

    let mut ranked = items.to_vec();

    ranked.sort_by(|a, b| {
        a.is_played
            .cmp(&b.is_played)
            .then_with(|| score(b).cmp(&score(a)))
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });

    ranked
}

/// The currently playing song is defined as the first unplayed song in
/// rank order. Ranking and "what plays next" are the same computation.
pub fn current_song(items: &[SongData], tallies: &HashMap<SongId, Tally>) -> Option<SongData> {
    rank(items, tallies).into_iter().find(|s| !s.is_played)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn song(id: SongId, created_offset_secs: i64, is_played: bool) -> SongData {
        SongData {
            id,
            room_code: "ABCDEF".to_string(),
            video_id: format!("video-{id}"),
            title: format!("Song {id}"),
            thumbnail: String::new(),
            duration_secs: 180,
            added_by: "someone".to_string(),
            is_played,
            created_at: Utc::now() + Duration::seconds(created_offset_secs),
        }
    }

    fn tally(up: u32, down: u32) -> Tally {
        Tally { up, down }
    }

    #[test]
    fn score_then_newest_first() {
        // A and B tie on score, B is newer. C outscores both.
        let a = song(1, 0, false);
        let b = song(2, 10, false);
        let c = song(3, 5, false);

        let tallies = HashMap::from([(1, tally(2, 0)), (2, tally(2, 0)), (3, tally(5, 0))]);

        let ranked = rank(&[a, b, c], &tallies);
        let order: Vec<_> = ranked.iter().map(|s| s.id).collect();

        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn unplayed_always_precede_played() {
        let played_but_popular = song(1, 0, true);
        let unplayed = song(2, 10, false);

        let tallies = HashMap::from([(1, tally(100, 0))]);

        let ranked = rank(&[played_but_popular, unplayed], &tallies);

        assert!(!ranked[0].is_played);
        assert_eq!(ranked[0].id, 2);
    }

    #[test]
    fn rank_is_deterministic() {
        let items: Vec<_> = (0..8).map(|i| song(i, i, i % 3 == 0)).collect();
        let tallies = HashMap::from([(2, tally(1, 0)), (5, tally(0, 2))]);

        let first: Vec<_> = rank(&items, &tallies).iter().map(|s| s.id).collect();

        let mut shuffled = items.clone();
        shuffled.reverse();
        let second: Vec<_> = rank(&shuffled, &tallies).iter().map(|s| s.id).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn current_song_skips_played() {
        let a = song(1, 0, true);
        let b = song(2, 1, false);
        let c = song(3, 2, false);

        let tallies = HashMap::from([(3, tally(5, 0))]);

        let current = current_song(&[a, b, c], &tallies).unwrap();
        assert_eq!(current.id, 3);
    }

    #[test]
    fn empty_queue_has_no_current_song() {
        assert!(current_song(&[], &HashMap::new()).is_none());
    }
}
