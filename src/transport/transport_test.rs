use super::*;

fn model(name: &str) -> ModelData {
    ModelData {
        name: name.to_string(),
        organization: "OpenConfig working group".to_string(),
        version: "2.4.3".to_string(),
    }
}

fn capabilities(models: &[&str]) -> Capabilities {
    Capabilities {
        version: "0.7.0".to_string(),
        encodings: vec![Encoding::JsonIetf],
        models: models.iter().map(|name| model(name)).collect(),
    }
}

fn pattern(text: &str) -> PathPattern {
    PathPattern::parse(text).unwrap()
}

#[test]
fn bare_root_should_match_a_model_by_its_last_segment() {
    let caps = capabilities(&["openconfig-interfaces", "openconfig-platform"]);

    assert!(caps.advertises_root(&pattern("/interfaces/interface[name=*]/state/counters/in-octets")));
    assert!(caps.advertises_root(&pattern("/platform/component[name=*]")));
    assert!(!caps.advertises_root(&pattern("/network-instances/network-instance[name=default]")));
    assert!(!caps.advertises_root(&pattern("/faces/face")));
}

#[test]
fn module_qualified_root_should_name_an_advertised_model() {
    let caps = capabilities(&["openconfig-interfaces"]);

    assert!(caps.advertises_root(&pattern("/openconfig-interfaces:interfaces/interface[name=*]")));
    assert!(!caps.advertises_root(&pattern("/openconfig-system:system/state")));
}

#[test]
fn model_named_like_the_root_should_cover_it() {
    let caps = capabilities(&["interfaces"]);

    assert!(caps.advertises_root(&pattern("/interfaces/interface")));
}

#[test]
fn device_without_advertised_models_should_cover_every_path() {
    let caps = capabilities(&[]);

    assert!(caps.advertises_root(&pattern("/anything/at/all")));
}

#[test]
fn encoding_support_should_follow_the_advertised_list() {
    let caps = capabilities(&[]);

    assert!(caps.supports_encoding(Encoding::JsonIetf));
    assert!(!caps.supports_encoding(Encoding::Proto));
}
