//! Ordered per-player timelines. Operations never mutate in place so scoring
//! effects can be reverted.

use crate::state::game::Track;

/// First index whose release year exceeds the track's year.
pub fn position_of(timeline: &[Track], track: &Track) -> usize {
    timeline.partition_point(|existing| existing.release_year <= track.release_year)
}

/// Whether the track's year lies strictly between its would-be neighbours at
/// `position`. A missing neighbour at either end never falsifies the guess.
pub fn is_position_correct(timeline: &[Track], track: &Track, position: usize) -> bool {
    if position > timeline.len() {
        return false;
    }

    let after_lower = position == 0 || timeline[position - 1].release_year < track.release_year;
    let before_upper =
        position == timeline.len() || track.release_year < timeline[position].release_year;

    after_lower && before_upper
}

/// New timeline with `track` inserted at [`position_of`].
pub fn insert(timeline: &[Track], track: &Track) -> Vec<Track> {
    let position = position_of(timeline, track);
    let mut next = Vec::with_capacity(timeline.len() + 1);
    next.extend_from_slice(&timeline[..position]);
    next.push(track.clone());
    next.extend_from_slice(&timeline[position..]);
    next
}

/// New timeline without the first track carrying `track_id`.
pub fn remove(timeline: &[Track], track_id: &str) -> Vec<Track> {
    let mut next = timeline.to_vec();
    if let Some(index) = next.iter().position(|track| track.id == track_id) {
        next.remove(index);
    }
    next
}
