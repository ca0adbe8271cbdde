use crate::domain::Track;
use crate::error::RipError;
use crate::store::TrackStore;

/// Keeps the candidates the store has never seen, in input order.
///
/// Any store error other than a miss aborts the whole batch.
pub fn filter_novel<S>(store: &S, candidates: Vec<Track>) -> Result<Vec<Track>, RipError>
where
    S: TrackStore + ?Sized,
{
    let mut novel = Vec::with_capacity(candidates.len());
    for track in candidates {
        if !is_known(store, &track)? {
            novel.push(track);
        }
    }
    Ok(novel)
}

/// A track is known when either of its links resolves to a stored record.
pub fn is_known<S>(store: &S, track: &Track) -> Result<bool, RipError>
where
    S: TrackStore + ?Sized,
{
    Ok(link_exists(store, &track.primary_link)? || link_exists(store, &track.secondary_link)?)
}

fn link_exists<S>(store: &S, link: &str) -> Result<bool, RipError>
where
    S: TrackStore + ?Sized,
{
    match store.get_track_by_link(link) {
        Ok(_) => Ok(true),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}
