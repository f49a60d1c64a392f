//! Coordinator guarantees exercised end to end against a recording transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use beacon_events::{EventData, RequestInfo, callback, names};
use beacon_runtime::{FlushOutcome, Page};
use beacon_settings::{BeaconSettings, BeaconType};
use beacon_transport::Delivery;

use common::{bare_page, counter, flush, hits, own_params, rt_page, settings};

#[test]
fn coalescing_many_requests_flush_once() {
    let (mut page, recorder) = bare_page(settings());
    let (cb, before) = counter();
    let _ = page.on(names::BEFORE_BEACON, cb);

    for i in 0..5 {
        page.vars_mut().add_var(format!("p{i}"), i, false);
        page.send_beacon(None);
    }
    let _ = page.run_until_idle();

    assert_eq!(recorder.count(), 1);
    assert_eq!(hits(&before), 1);
    let beacon = &recorder.sent()[0];
    for i in 0..5 {
        assert_eq!(beacon.param(&format!("p{i}")), Some(i.to_string()));
    }
}

#[test]
fn priority_buckets_order_params() {
    let (mut page, recorder) = bare_page(settings());
    let vars = page.vars_mut();
    vars.add_var("a", 1, false);
    vars.add_var("m", 2, false);
    vars.add_var("b", 3, false);
    vars.add_var("z", 4, false);
    vars.set_var_priority("a", -1);
    vars.set_var_priority("b", -1);
    vars.set_var_priority("z", 1);
    flush(&mut page);

    let beacon = &recorder.sent()[0];
    assert_eq!(own_params(beacon, &["a", "b", "m", "z"]), ["a", "b", "m", "z"]);
    assert!(beacon.payload().starts_with("a=1&b=3&m=2&"));
    assert!(beacon.payload().ends_with("&z=4"));
}

#[test]
fn single_use_var_rides_one_beacon() {
    let (mut page, recorder) = bare_page(settings());
    page.vars_mut().add_var("once", "yes", true);
    page.vars_mut().add_var("sticky", "yes", false);
    flush(&mut page);
    flush(&mut page);

    let sent = recorder.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].param("once").as_deref(), Some("yes"));
    assert!(sent[1].param("once").is_none());
    assert_eq!(sent[1].param("sticky").as_deref(), Some("yes"));
}

#[test]
fn page_load_latch_fires_once() {
    let (mut page, recorder) = bare_page(settings());
    let (cb, notified) = counter();
    let _ = page.on(names::PAGE_LOAD_BEACON, cb);

    page.vars_mut().add_var("http.initiator", "xhr", false);
    flush(&mut page);
    assert!(!page.has_sent_page_load_beacon());
    assert_eq!(hits(&notified), 0);

    flush(&mut page);
    assert!(page.has_sent_page_load_beacon());
    assert_eq!(hits(&notified), 1);

    flush(&mut page);
    assert_eq!(hits(&notified), 1);
    assert_eq!(recorder.count(), 3);
}

#[test]
fn spa_beacons_do_not_latch() {
    let (mut page, _) = bare_page(settings());
    page.vars_mut().add_var("http.initiator", "spa", false);
    flush(&mut page);
    assert!(!page.has_sent_page_load_beacon());
}

#[test]
fn dynamic_requests_wait_for_page_load_beacon() {
    let (mut page, recorder) = rt_page(settings());
    page.page_ready();
    page.response_end(RequestInfo::new("https://api.example/one", 10));
    page.response_end(RequestInfo::new("https://api.example/two", 20));
    assert_eq!(recorder.count(), 0);

    let _ = page.run_until_idle();

    let sent = recorder.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].param("http.initiator").is_none());
    assert!(sent[0].param("t_done").is_some());
    assert_eq!(sent[1].param("u").as_deref(), Some("https://api.example/one"));
    assert_eq!(sent[1].param("http.initiator").as_deref(), Some("xhr"));
    assert_eq!(sent[1].param("xhr.pg").as_deref(), Some("https://api.example/one"));
    assert_eq!(sent[1].param("pgu").as_deref(), Some(common::PAGE_URL));
    assert_eq!(sent[2].param("u").as_deref(), Some("https://api.example/two"));
    assert_eq!(sent[2].param("xhr.pg").as_deref(), Some("https://api.example/two"));
}

#[test]
fn spa_requests_skip_page_load_deferral() {
    let (mut page, recorder) = rt_page(BeaconSettings {
        autorun: false,
        ..settings()
    });
    page.page_ready();
    page.response_end(RequestInfo::new("https://site.example/route", 0).with_initiator("spa"));
    let _ = page.run_until_idle();

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].param("http.initiator").as_deref(), Some("spa"));
    assert!(!page.has_sent_page_load_beacon());
}

#[tokio::test(start_paused = true)]
async fn response_end_polls_gate_until_ready() {
    let (mut page, recorder) = rt_page(settings());
    page.response_end_named("checkout", 0, None, Some(40));
    assert_eq!(page.run_until_idle(), 0);

    tokio::time::advance(Duration::from_millis(999)).await;
    assert_eq!(page.run_until_idle(), 0);
    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(page.run_until_idle(), 1);
    assert_eq!(recorder.count(), 0);

    page.page_ready();
    tokio::time::advance(Duration::from_millis(1000)).await;
    let _ = page.run_until_idle();

    let sent = recorder.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].param("http.initiator").is_none());
    assert_eq!(sent[1].param("http.initiator").as_deref(), Some("xhr"));
    assert_eq!(sent[1].param("xhr.pg").as_deref(), Some("checkout"));
    assert_eq!(sent[1].param("t_done").as_deref(), Some("40"));
}

#[test]
fn identical_subscription_runs_once() {
    let (mut page, _) = bare_page(settings());
    let (cb, count) = counter();
    let scope = Some("producer".to_string());
    let data = Some(serde_json::json!({"k": 1}));
    let _ = page.subscribe("custom", Arc::clone(&cb), data.clone(), scope.clone(), false);
    let _ = page.subscribe("CUSTOM", cb, data, scope, false);

    let _ = page.fire_event("custom", &EventData::None);
    assert_eq!(hits(&count), 1);
}

#[test]
fn snapshot_isolation_between_pre_and_post_flush() {
    let (mut page, recorder) = bare_page(settings());
    let _ = page.on(
        names::BEFORE_BEACON,
        callback(|page: &mut Page, _, _| {
            page.vars_mut().add_var("pre", "seen", false);
            Ok(())
        }),
    );
    let _ = page.on(
        names::BEACON,
        callback(|page: &mut Page, data, _| {
            assert!(data.as_vars().is_some_and(|s| s.contains("pre")));
            page.vars_mut().add_var("post", "late", false);
            Ok(())
        }),
    );
    flush(&mut page);

    let beacon = &recorder.sent()[0];
    assert_eq!(beacon.param("pre").as_deref(), Some("seen"));
    assert!(beacon.param("post").is_none());
    assert!(page.vars().has_var("post"));
}

#[test]
fn post_fallback_retries_exactly_once() {
    let (mut page, recorder) = bare_page(BeaconSettings {
        beacon_type: BeaconType::Post,
        ..settings()
    });
    recorder.fail_primary(true);
    recorder.fail_secondary(true);
    page.send_beacon(None);
    assert_matches!(page.real_send_beacon(), FlushOutcome::TransportFailed);
    assert_eq!(recorder.attempts(), [Delivery::Post, Delivery::PostSecondary]);
    assert_eq!(recorder.count(), 0);

    recorder.reset();
    recorder.fail_secondary(false);
    page.send_beacon(None);
    assert_eq!(page.real_send_beacon(), FlushOutcome::Sent(Delivery::PostSecondary));
    assert_eq!(recorder.attempts(), [Delivery::Post, Delivery::PostSecondary]);
}

#[test]
fn long_payload_switches_to_post() {
    let (mut page, recorder) = bare_page(settings());
    page.vars_mut().add_var("big", "x".repeat(2500), false);
    flush(&mut page);
    assert_eq!(recorder.sent()[0].delivery, Delivery::Post);
}

#[test]
fn allow_list_blocks_foreign_destinations() {
    let (mut page, recorder) = bare_page(BeaconSettings {
        beacon_urls_allowed: vec![r"^https://good\.example".into()],
        ..settings()
    });

    page.send_beacon(Some("https://evil.example/x".into()));
    assert_eq!(page.real_send_beacon(), FlushOutcome::Disallowed);
    assert!(recorder.attempts().is_empty());

    page.send_beacon(Some("https://good.example/x".into()));
    assert!(page.real_send_beacon().is_sent());
    assert_eq!(recorder.count(), 1);
    assert!(recorder.sent()[0].url.starts_with("https://good.example/x?"));
}

#[test]
fn subscriber_errors_reach_next_beacon() {
    let (mut page, recorder) = bare_page(settings());
    let _ = page.on(
        names::BEFORE_BEACON,
        callback(|_: &mut Page, _, _| Err(beacon_events::BusError::failed("boom"))),
    );
    flush(&mut page);
    flush(&mut page);
    flush(&mut page);

    let sent = recorder.sent();
    assert!(sent[0].param("errors").is_none());
    assert_eq!(sent[1].param("errors").as_deref(), Some("before_beacon: boom"));
    assert_eq!(sent[2].param("errors").as_deref(), Some("before_beacon: boom"));
}

#[test]
fn native_beacon_marks_payload() {
    let (mut page, recorder) = bare_page(BeaconSettings {
        beacon_disable_sendbeacon: false,
        ..settings()
    });
    flush(&mut page);
    let beacon = &recorder.sent()[0];
    assert_eq!(beacon.delivery, Delivery::Beacon);
    assert_eq!(beacon.param("sb").as_deref(), Some("1"));
}
