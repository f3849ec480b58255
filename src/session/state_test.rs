use super::SessionState;
use super::SessionState::*;

const ALL: [SessionState; 8] = [
    Disconnected,
    Connecting,
    CapabilitiesExchanged,
    Subscribing,
    Streaming,
    Reconnecting,
    Closing,
    Closed,
];

#[test]
fn happy_path_should_be_allowed() {
    let path = [
        Disconnected,
        Connecting,
        CapabilitiesExchanged,
        Subscribing,
        Streaming,
        Closing,
        Closed,
    ];
    for pair in path.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }
}

#[test]
fn capabilities_step_may_be_skipped() {
    assert!(Connecting.can_transition_to(Subscribing));
}

#[test]
fn every_live_state_but_disconnected_may_start_reconnecting() {
    for from in [Connecting, CapabilitiesExchanged, Subscribing, Streaming] {
        assert!(from.can_transition_to(Reconnecting), "{from}");
    }
    assert!(!Disconnected.can_transition_to(Reconnecting));
    assert!(!Closing.can_transition_to(Reconnecting));
}

#[test]
fn reconnecting_should_lead_to_connecting_or_closed() {
    assert!(Reconnecting.can_transition_to(Connecting));
    assert!(Reconnecting.can_transition_to(Closed));
    assert!(!Reconnecting.can_transition_to(Streaming));
    assert!(!Reconnecting.can_transition_to(Subscribing));
}

#[test]
fn closed_should_be_terminal() {
    for to in ALL {
        assert!(!Closed.can_transition_to(to), "closed -> {to}");
    }
}

#[test]
fn closing_should_only_lead_to_closed() {
    for to in ALL {
        assert_eq!(Closing.can_transition_to(to), to == Closed, "closing -> {to}");
    }
}

#[test]
fn any_other_state_may_start_closing() {
    for from in ALL {
        if from == Closing || from == Closed {
            continue;
        }
        assert!(from.can_transition_to(Closing), "{from}");
    }
}

#[test]
fn streaming_should_not_skip_back_to_connecting() {
    assert!(!Streaming.can_transition_to(Connecting));
    assert!(!Streaming.can_transition_to(Disconnected));
}

#[test]
fn names_should_be_snake_case() {
    assert_eq!(CapabilitiesExchanged.as_str(), "capabilities_exchanged");
    assert_eq!(Streaming.to_string(), "streaming");
    assert!(Closed.is_closed());
    assert!(!Closing.is_closed());
}
