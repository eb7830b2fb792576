// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `backoff.rs`

#[cfg(test)]
mod tests {
    use crate::config::ControllerConfig;
    use crate::reconcilers::backoff::{ExponentialBackoff, FailureBackoff};
    use std::time::Duration;

    fn exact(initial: u64, max: u64) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_secs(initial),
            Duration::from_secs(max),
            2.0,
            0.0,
        )
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let mut backoff = exact(5, 300);
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_backoff().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);
    }

    #[test]
    fn test_backoff_reset_returns_to_initial() {
        let mut backoff = exact(5, 300);
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(100),
            Duration::from_secs(1000),
            2.0,
            0.1,
        );
        for _ in 0..50 {
            backoff.reset();
            let delay = backoff.next_backoff().as_secs_f64();
            assert!(
                (90.0..=110.0).contains(&delay),
                "delay {delay} outside ±10% of 100s"
            );
        }
    }

    #[test]
    fn test_jitter_never_exceeds_max() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(300),
            Duration::from_secs(300),
            2.0,
            0.1,
        );
        for _ in 0..20 {
            assert!(backoff.next_backoff() <= Duration::from_secs(300));
        }
    }

    #[test]
    fn test_failure_backoff_tracks_keys_independently() {
        let backoff = FailureBackoff::new(Duration::from_secs(5), Duration::from_secs(300), 0.0);

        assert_eq!(backoff.next_delay("ns/a"), Duration::from_secs(5));
        assert_eq!(backoff.next_delay("ns/a"), Duration::from_secs(10));
        assert_eq!(backoff.next_delay("ns/b"), Duration::from_secs(5));
        assert_eq!(backoff.tracked_keys(), 2);

        backoff.reset("ns/a");
        assert_eq!(backoff.tracked_keys(), 1);
        assert_eq!(backoff.next_delay("ns/a"), Duration::from_secs(5));
    }

    #[test]
    fn test_deleted_object_ref_clears_its_entry() {
        use crate::crd::KlusterletAddonConfig;
        use crate::store::ObjectKey;
        use kube::runtime::reflector::ObjectRef;

        let backoff = FailureBackoff::new(Duration::from_secs(5), Duration::from_secs(300), 0.0);
        let mut config = KlusterletAddonConfig::new("c1", Default::default());
        config.metadata.namespace = Some("c1".to_string());

        // The error policy keys by object, the controller reports deletions by erased ref.
        backoff.next_delay(&ObjectKey::of(&config).to_string());
        backoff.next_delay("c2/c2");
        let deleted = ObjectRef::from_obj(&config).erase();
        backoff.reset(&ObjectKey::from(&deleted).to_string());

        assert_eq!(backoff.tracked_keys(), 1);
        assert_eq!(backoff.next_delay("c1/c1"), Duration::from_secs(5));
    }

    #[test]
    fn test_max_never_below_initial() {
        let backoff = FailureBackoff::new(Duration::from_secs(30), Duration::from_secs(1), 0.0);
        assert_eq!(backoff.next_delay("k"), Duration::from_secs(30));
        assert_eq!(backoff.next_delay("k"), Duration::from_secs(30));
    }

    #[test]
    fn test_default_bounds_follow_config() {
        let config = ControllerConfig::default();
        let backoff = FailureBackoff::from_config(&config);
        let first = backoff.next_delay("k").as_secs_f64();
        let initial = config.error_backoff_initial().as_secs_f64();
        assert!(first >= initial * 0.9 && first <= initial * 1.1);
    }
}
