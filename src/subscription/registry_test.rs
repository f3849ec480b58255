use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::*;
use crate::Error;
use crate::Path;
use crate::PathElem;
use crate::PathPattern;
use crate::RawUpdate;
use crate::RawValue;
use crate::SubscriptionError;

fn pattern(text: &str) -> PathPattern {
    PathPattern::parse(text).unwrap()
}

fn counter_update(iface: &str, leaf: &str) -> RawUpdate {
    RawUpdate {
        path: Path::new(vec![
            PathElem::new("interfaces"),
            PathElem::new("interface").with_key("name", iface),
            PathElem::new("state"),
            PathElem::new("counters"),
            PathElem::new(leaf),
        ]),
        value: Some(RawValue::Uint(1)),
        timestamp: None,
    }
}

#[test]
fn add_should_assign_unique_ids() {
    let registry = SubscriptionRegistry::new();

    let a = registry
        .add(pattern("/a/b"), SubscriptionMode::OnChange)
        .unwrap();
    let b = registry
        .add(pattern("/a/b"), SubscriptionMode::OnChange)
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(registry.len(), 2);
}

#[test]
fn sample_with_zero_interval_should_fail_and_leave_registry_unchanged() {
    let registry = SubscriptionRegistry::new();
    registry
        .add(pattern("/a"), SubscriptionMode::sample(Duration::from_secs(5)))
        .unwrap();
    let generation = registry.generation();

    let result = registry.add(pattern("/b"), SubscriptionMode::sample(Duration::ZERO));

    assert!(matches!(result, Err(Error::Config(_))));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.generation(), generation);
}

#[test]
fn remove_should_drop_subscription_and_reject_unknown_ids() {
    let registry = SubscriptionRegistry::new();
    let id = registry
        .add(pattern("/a"), SubscriptionMode::OnChange)
        .unwrap();

    registry.remove(id).unwrap();
    assert!(registry.is_empty());
    assert!(registry.get(id).is_none());

    let again = registry.remove(id);
    assert!(matches!(
        again,
        Err(Error::Subscription(SubscriptionError::UnknownSubscription(_)))
    ));
}

#[test]
fn all_should_preserve_registration_order_and_fields() {
    let registry = SubscriptionRegistry::new();
    let interval = Duration::from_secs(5);
    let first = registry
        .add(pattern("/x"), SubscriptionMode::sample(interval))
        .unwrap();
    let second = registry
        .add(pattern("/y"), SubscriptionMode::OnChange)
        .unwrap();

    let all = registry.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id(), first);
    assert_eq!(all[0].mode().sample_interval(), Some(interval));
    assert_eq!(all[1].id(), second);
    assert_eq!(all[1].pattern().to_string(), "/y");
}

#[test]
fn match_update_should_return_every_overlapping_subscription() {
    let registry = SubscriptionRegistry::new();
    let wildcard = registry
        .add(
            pattern("/interfaces/interface[name=*]/state/counters/in-octets"),
            SubscriptionMode::OnChange,
        )
        .unwrap();
    let exact = registry
        .add(
            pattern("/interfaces/interface[name=Ethernet1]/state/counters/in-octets"),
            SubscriptionMode::sample(Duration::from_secs(1)),
        )
        .unwrap();
    registry
        .add(
            pattern("/interfaces/interface[name=*]/state/counters/out-octets"),
            SubscriptionMode::OnChange,
        )
        .unwrap();

    let matches = registry.match_update(&counter_update("Ethernet1", "in-octets"));

    let ids: Vec<_> = matches.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![wildcard, exact]);
    for (_, keys) in &matches {
        assert_eq!(keys.get("name").map(String::as_str), Some("Ethernet1"));
    }

    let none = registry.match_update(&counter_update("Ethernet1", "in-errors"));
    assert!(none.is_empty());
}

#[test]
fn snapshot_should_not_observe_later_changes() {
    let registry = SubscriptionRegistry::new();
    let id = registry
        .add(pattern("/interfaces/interface[name=*]/state/oper-status"), SubscriptionMode::OnChange)
        .unwrap();

    let snapshot = registry.snapshot();
    registry.remove(id).unwrap();
    registry
        .add(pattern("/system/state/hostname"), SubscriptionMode::OnChange)
        .unwrap();

    assert_eq!(snapshot.ids(), vec![id]);
    assert!(snapshot.generation() < registry.generation());
}

#[test]
fn concurrent_adds_should_not_lose_entries() {
    let registry = Arc::new(SubscriptionRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            thread::spawn(move || {
                for j in 0..25 {
                    registry
                        .add(pattern(&format!("/t{i}/p{j}")), SubscriptionMode::OnChange)
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(registry.len(), 200);
    let mut ids: Vec<_> = registry.all().iter().map(|s| s.id()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
}
