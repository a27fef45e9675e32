//! Integration tests for the command route table.
//!
//! Every documented `(route, action)` pair must parse; anything else must be
//! rejected with the matching error kind.

use driver_core::{
    protocol::route::{AppAction, DriverAction, ElementAction, RawRouteAction},
    CommandError, CommandResponse, RouteAction, RouteName,
};

/// A minimal valid body for each documented pair.
fn valid_body(route: RouteName, action: &str) -> String {
    let params: &[&str] = match (route, action) {
        (RouteName::App, "list") => &[],
        (RouteName::App, _) => &["com.example.app"],
        (RouteName::Element, "tap") => &["pixel", "0", "0", "10;20;100;50"],
        (RouteName::Element, "swipe") => &["pixel", "0", "0", "10;20;100;50", "0", "-100"],
        (RouteName::Element, "input") => &["pixel", "hello"],
        (RouteName::Element, "script") => &["pixel", "0", "0", "10;20;100;50", "tap(1)"],
        (RouteName::Alert, "tap") => &["pixel", "10;20;100;50"],
        (RouteName::Alert, "input") => &["pixel", "hello"],
        (RouteName::PropertySet, "orientation") => &["portrait"],
        (RouteName::PropertySet, _) => &["on"],
        (RouteName::Element | RouteName::Alert, _) => &["pixel"],
        _ => &[],
    };
    std::iter::once(action).chain(params.iter().copied()).collect::<Vec<_>>().join("\n")
}

#[test]
fn test_every_documented_pair_parses() {
    for route in RouteName::ALL {
        for action in route.actions() {
            let body = valid_body(route, action);

            let parsed = RouteAction::parse(route.as_str(), &body)
                .unwrap_or_else(|e| panic!("{route} {action} failed: {e}"));

            assert_eq!(parsed.route(), route);
            assert_eq!(parsed.action_name(), *action);
        }
    }
}

#[test]
fn test_route_names_round_trip_through_from_name() {
    for route in RouteName::ALL {
        assert_eq!(RouteName::from_name(route.as_str()), Some(route));
    }
    assert_eq!(RouteName::from_name("PROPERTY-SET"), Some(RouteName::PropertySet));
    assert_eq!(RouteName::from_name("keyboard"), None);
}

#[test]
fn test_unknown_action_on_every_route_is_rejected() {
    for route in RouteName::ALL {
        let result = RouteAction::parse(route.as_str(), &valid_body(route, "frobnicate"));
        assert!(
            matches!(result, Err(CommandError::UnknownAction { .. })),
            "{route}: {result:?}"
        );
    }
}

#[test]
fn test_crlf_bodies_parse_like_lf_bodies() {
    assert_eq!(
        RouteAction::parse("app", "switch\r\ncom.example.app\r\n"),
        RouteAction::parse("app", "switch\ncom.example.app")
    );
}

#[test]
fn test_action_is_case_insensitive() {
    assert_eq!(
        RouteAction::parse("driver", "Start"),
        Ok(RouteAction::Driver(DriverAction::Start))
    );
    assert_eq!(
        RouteAction::parse("app", "LIST"),
        Ok(RouteAction::App(AppAction::List))
    );
}

#[test]
fn test_raw_parse_keeps_parameter_order() {
    let raw = RawRouteAction::parse("element", "swipe\npoint\n1\n2\n0;0;5;5\n3\n4").expect("parse");
    assert_eq!(raw.parameters, vec!["1", "2", "0;0;5;5", "3", "4"]);
}

#[test]
fn test_malformed_frame_is_invalid_parameter() {
    let result = RouteAction::parse("element", "tap\npixel\n0\n0\n10;20;100");
    assert!(matches!(
        result,
        Err(CommandError::InvalidParameter { name: "frame", .. })
    ));
}

#[test]
fn test_swipe_keeps_direction_values() {
    let action = RouteAction::parse("element", "swipe\npixel\n0\n0\n0;0;10;10\n-5.5\n12").expect("parse");

    let RouteAction::Element(ElementAction::Swipe { direction_x, direction_y, .. }) = action else {
        panic!("expected swipe");
    };
    assert_eq!((direction_x, direction_y), (-5.5, 12.0));
}

#[test]
fn test_parse_errors_become_negative_responses() {
    let err = RouteAction::parse("nowhere", "start").expect_err("must fail");

    let response = CommandResponse::from(err);

    assert_eq!(response.status, "-10");
    assert!(!response.is_success());
}
