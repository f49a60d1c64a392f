//! Shared fixtures for the coordinator integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use beacon_events::{Callback, callback};
use beacon_runtime::{Page, PageOptions};
use beacon_settings::BeaconSettings;
use beacon_transport::{Recorder, SentBeacon};

pub const PAGE_URL: &str = "https://site.example/home";
pub const COLLECTOR: &str = "https://collector.example/beacon";

/// Settings that deliver every beacon through the image mechanism.
pub fn settings() -> BeaconSettings {
    BeaconSettings {
        beacon_url: COLLECTOR.into(),
        beacon_disable_sendbeacon: true,
        ..BeaconSettings::default()
    }
}

/// A page without the round-trip producer.
pub fn bare_page(settings: BeaconSettings) -> (Page, Recorder) {
    build(settings, PageOptions {
        url: PAGE_URL.into(),
        round_trip: false,
        ..PageOptions::default()
    })
}

/// A page with the round-trip producer installed.
pub fn rt_page(settings: BeaconSettings) -> (Page, Recorder) {
    build(settings, PageOptions {
        url: PAGE_URL.into(),
        ..PageOptions::default()
    })
}

pub fn build(settings: BeaconSettings, options: PageOptions) -> (Page, Recorder) {
    let recorder = Recorder::new();
    let page = Page::new(settings, recorder.transport(), options).unwrap();
    (page, recorder)
}

/// Queue a beacon and drain the task queue.
pub fn flush(page: &mut Page) {
    page.send_beacon(None);
    let _ = page.run_until_idle();
}

/// Names of the test-owned params (everything but the derived fields).
pub fn own_params(beacon: &SentBeacon, names: &[&str]) -> Vec<String> {
    beacon
        .param_names()
        .into_iter()
        .filter(|n| names.contains(&n.as_str()))
        .collect()
}

/// A callback that counts its invocations.
pub fn counter() -> (Callback<Page>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let cb = callback(move |_: &mut Page, _, _| {
        let _ = seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (cb, count)
}

pub fn hits(count: &AtomicUsize) -> usize {
    count.load(Ordering::SeqCst)
}
