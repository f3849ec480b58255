use super::*;

fn concrete(iface: &str, leaf: &str) -> Path {
    Path::new(vec![
        PathElem::new("interfaces"),
        PathElem::new("interface").with_key("name", iface),
        PathElem::new("state"),
        PathElem::new("counters"),
        PathElem::new(leaf),
    ])
}

#[test]
fn wildcard_key_should_bind_concrete_value() {
    let pattern = PathPattern::parse("/interfaces/interface[name=*]/state/counters/in-octets").unwrap();

    let bindings = match_path(&pattern, &concrete("Ethernet1", "in-octets")).unwrap();

    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings.get("name").map(String::as_str), Some("Ethernet1"));
}

#[test]
fn exact_key_should_only_match_equal_value() {
    let pattern = PathPattern::parse("/interfaces/interface[name=Ethernet2]/state/counters/in-octets").unwrap();

    assert!(match_path(&pattern, &concrete("Ethernet1", "in-octets")).is_none());
    let bindings = match_path(&pattern, &concrete("Ethernet2", "in-octets")).unwrap();
    assert_eq!(bindings.get("name").map(String::as_str), Some("Ethernet2"));
}

#[test]
fn literal_mismatch_should_fail() {
    let pattern = PathPattern::parse("/interfaces/interface[name=*]/state/counters/out-octets").unwrap();

    assert!(match_path(&pattern, &concrete("Ethernet1", "in-octets")).is_none());
}

#[test]
fn length_mismatch_should_fail() {
    let shorter = PathPattern::parse("/interfaces/interface[name=*]/state/counters").unwrap();
    let longer = PathPattern::parse("/interfaces/interface[name=*]/state/counters/in-octets/extra").unwrap();

    assert!(match_path(&shorter, &concrete("Ethernet1", "in-octets")).is_none());
    assert!(match_path(&longer, &concrete("Ethernet1", "in-octets")).is_none());
}

#[test]
fn wildcard_key_absent_on_concrete_segment_should_fail() {
    let pattern = PathPattern::parse("/interfaces/interface[name=*]/state").unwrap();
    let path = Path::new(vec![
        PathElem::new("interfaces"),
        PathElem::new("interface"),
        PathElem::new("state"),
    ]);

    assert!(match_path(&pattern, &path).is_none());
}

#[test]
fn multiple_predicates_should_all_bind() {
    let pattern = PathPattern::parse("/interfaces/interface[name=*]/subinterfaces/subinterface[index=*]").unwrap();
    let path = Path::new(vec![
        PathElem::new("interfaces"),
        PathElem::new("interface").with_key("name", "Ethernet3"),
        PathElem::new("subinterfaces"),
        PathElem::new("subinterface").with_key("index", "7"),
    ]);

    let bindings = match_path(&pattern, &path).unwrap();
    assert_eq!(bindings.get("name").map(String::as_str), Some("Ethernet3"));
    assert_eq!(bindings.get("index").map(String::as_str), Some("7"));
}

#[test]
fn two_predicates_on_one_segment_should_both_be_required() {
    let pattern = PathPattern::parse("/routes/route[prefix=*][vrf=*]").unwrap();
    let partial = Path::new(vec![
        PathElem::new("routes"),
        PathElem::new("route").with_key("prefix", "10.0.0.0/8"),
    ]);
    let full = Path::new(vec![
        PathElem::new("routes"),
        PathElem::new("route").with_key("prefix", "10.0.0.0/8").with_key("vrf", "mgmt"),
    ]);

    assert!(match_path(&pattern, &partial).is_none());
    let bindings = match_path(&pattern, &full).unwrap();
    assert_eq!(bindings.len(), 2);
}

#[test]
fn unmentioned_concrete_keys_should_be_ignored() {
    let pattern = PathPattern::parse("/network-instances/network-instance/state").unwrap();
    let path = Path::new(vec![
        PathElem::new("network-instances"),
        PathElem::new("network-instance").with_key("name", "default"),
        PathElem::new("state"),
    ]);

    let bindings = match_path(&pattern, &path).unwrap();
    assert!(bindings.is_empty());
}

#[test]
fn colliding_key_names_should_be_qualified_by_segment() {
    let pattern = PathPattern::parse("/interface[name=*]/neighbor[name=*]").unwrap();
    let path = Path::new(vec![
        PathElem::new("interface").with_key("name", "Ethernet1"),
        PathElem::new("neighbor").with_key("name", "spine2"),
    ]);

    let bindings = match_path(&pattern, &path).unwrap();
    assert_eq!(bindings.get("name").map(String::as_str), Some("Ethernet1"));
    assert_eq!(bindings.get("neighbor/name").map(String::as_str), Some("spine2"));
}

#[test]
fn match_should_be_deterministic_across_calls() {
    let pattern = PathPattern::parse("/interfaces/interface[name=*]/state/counters/in-octets").unwrap();
    let path = concrete("Ethernet9", "in-octets");

    let first = match_path(&pattern, &path);
    for _ in 0..10 {
        assert_eq!(match_path(&pattern, &path), first);
    }
}
