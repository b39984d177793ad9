//! Conflict resolution for linked list pairs.

use chrono::{DateTime, Utc};

/// Which side's version of a linked pair should prevail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Apply the remote version locally.
    Pull,
    /// Apply the local version remotely.
    Push,
    /// Both sides are unchanged since the last sync.
    None,
}

/// Decide the winner for one linked pair.
///
/// A side counts as changed if it was modified after `synced_at`, or if the
/// pair was never synced. When both changed, the later timestamp wins and
/// the remote side wins ties. A side without a timestamp loses to one with.
pub fn resolve(
    ext_updated_at: Option<DateTime<Utc>>,
    local_updated_at: DateTime<Utc>,
    synced_at: Option<DateTime<Utc>>,
) -> Resolution {
    let (ext_changed, local_changed) = match synced_at {
        None => (true, true),
        Some(synced_at) => (
            ext_updated_at.is_some_and(|ext| ext > synced_at),
            local_updated_at > synced_at,
        ),
    };

    match (ext_changed, local_changed) {
        (true, false) => Resolution::Pull,
        (false, true) => Resolution::Push,
        (false, false) => Resolution::None,
        (true, true) => match ext_updated_at {
            Some(ext) if ext >= local_updated_at => Resolution::Pull,
            Some(_) => Resolution::Push,
            None => Resolution::Push,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_tie_favours_remote() {
        let t = t();
        assert_eq!(resolve(Some(t), t, Some(t - Duration::hours(1))), Resolution::Pull);
    }

    #[test]
    fn test_never_synced_without_remote_timestamp_pushes() {
        assert_eq!(resolve(None, t(), None), Resolution::Push);
    }

    #[test]
    fn test_never_synced_later_side_wins() {
        let t = t();
        assert_eq!(resolve(Some(t), t - Duration::hours(1), None), Resolution::Pull);
        assert_eq!(resolve(Some(t - Duration::hours(1)), t, None), Resolution::Push);
    }

    #[test]
    fn test_both_changed_remote_later() {
        let t = t();
        let synced = t - Duration::days(1);
        assert_eq!(
            resolve(Some(t - Duration::hours(1)), t - Duration::hours(2), Some(synced)),
            Resolution::Pull
        );
    }

    #[test]
    fn test_one_side_changed() {
        let t = t();
        let synced = Some(t - Duration::days(1));
        assert_eq!(resolve(Some(t), synced.unwrap(), synced), Resolution::Pull);
        assert_eq!(resolve(synced, t, synced), Resolution::Push);
        assert_eq!(resolve(None, t, synced), Resolution::Push);
    }

    #[test]
    fn test_unchanged() {
        let t = t();
        assert_eq!(resolve(Some(t), t, Some(t)), Resolution::None);
        assert_eq!(resolve(None, t - Duration::hours(1), Some(t)), Resolution::None);
    }

    fn instant() -> impl Strategy<Value = DateTime<Utc>> {
        // A small range makes exact ties common.
        (0i64..20).prop_map(|minutes| t() + Duration::minutes(minutes))
    }

    proptest! {
        #[test]
        fn prop_deterministic(
            ext in proptest::option::of(instant()),
            local in instant(),
            synced in proptest::option::of(instant()),
        ) {
            prop_assert_eq!(resolve(ext, local, synced), resolve(ext, local, synced));
        }

        #[test]
        fn prop_pull_requires_remote_timestamp(
            ext in proptest::option::of(instant()),
            local in instant(),
            synced in proptest::option::of(instant()),
        ) {
            if resolve(ext, local, synced) == Resolution::Pull {
                prop_assert!(ext.is_some());
            }
        }

        #[test]
        fn prop_none_means_nothing_newer_than_watermark(
            ext in proptest::option::of(instant()),
            local in instant(),
            synced in proptest::option::of(instant()),
        ) {
            if resolve(ext, local, synced) == Resolution::None {
                let synced = synced.unwrap();
                prop_assert!(local <= synced);
                prop_assert!(ext.map_or(true, |ext| ext <= synced));
            }
        }

        #[test]
        fn prop_push_requires_local_change(
            ext in proptest::option::of(instant()),
            local in instant(),
            synced in proptest::option::of(instant()),
        ) {
            if resolve(ext, local, synced) == Resolution::Push {
                prop_assert!(synced.map_or(true, |synced| local > synced));
            }
        }

        #[test]
        fn prop_tie_always_pulls(at in instant(), back in 1i64..120) {
            prop_assert_eq!(
                resolve(Some(at), at, Some(at - Duration::minutes(back))),
                Resolution::Pull
            );
        }
    }
}
