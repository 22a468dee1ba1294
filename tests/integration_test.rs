//! End-to-end capture, retention and export scenarios

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

use har_recorder::capture::{parse_capture_log, HookEvent, RawResponse, TimingEntry, XHR_INITIATOR};
use har_recorder::clock::{Clock, ManualClock, SequentialIdGenerator};
use har_recorder::resource::{PageRef, PerformanceTiming, Resource};
use har_recorder::{Config, HarRecorder, RecorderService};

/// Create test configuration
fn create_test_config(life_limit_ms: u64, max_count: usize) -> Config {
    Config {
        resource_life_limit_ms: life_limit_ms,
        max_resource_count: max_count,
        ..Config::default()
    }
}

fn create_recorder(config: &Config) -> (Arc<ManualClock>, HarRecorder) {
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
    let recorder =
        HarRecorder::with_sources(config, clock.clone(), Arc::new(SequentialIdGenerator::new()));
    (clock, recorder)
}

fn numbered(clock: &ManualClock, n: usize) -> Resource {
    let mut resource = Resource::empty(clock.now());
    resource.performance = Some(PerformanceTiming {
        url: format!("https://api.test/{n}"),
        ..Default::default()
    });
    resource
}

fn xhr(recorder: &mut HarRecorder, call_id: u64, url: &str, timing_first: bool) {
    let timing = HookEvent::Timing(TimingEntry {
        name: url.to_string(),
        initiator_type: XHR_INITIATOR.to_string(),
        start_time: 100.0,
        duration: 13.37,
        ..Default::default()
    });

    if timing_first {
        recorder.handle_hook(&timing);
    }
    recorder.handle_hook(&HookEvent::RequestStart {
        call_id,
        method: "GET".to_string(),
        url: url.to_string(),
    });
    recorder.handle_hook(&HookEvent::HeaderSet {
        call_id,
        name: "Accept".to_string(),
        value: "application/json".to_string(),
    });
    recorder.handle_hook(&HookEvent::Send {
        call_id,
        body: None,
    });
    recorder.handle_hook(&HookEvent::Complete {
        call_id,
        response: RawResponse {
            status: 200,
            status_text: "OK".to_string(),
            response_url: Some(url.to_string()),
            response_text: Some("{\"dummy\":\"content\"}".to_string()),
            all_response_headers: "content-type: application/json\r\n".to_string(),
        },
    });
    if !timing_first {
        recorder.handle_hook(&timing);
    }
}

#[test]
fn test_count_limit_keeps_newest_in_order() {
    let (clock, mut recorder) = create_recorder(&create_test_config(600_000, 50));

    for n in 1..=100 {
        recorder.add_resource(numbered(&clock, n));
    }

    let window = recorder.snapshot();
    assert_eq!(window.resources.len(), 50);
    let expected: Vec<Resource> = (51..=100).map(|n| numbered(&clock, n)).collect();
    assert_eq!(window.resources, expected.as_slice());
}

#[test]
fn test_time_limit_drops_old_resource() {
    let (clock, mut recorder) = create_recorder(&create_test_config(10_000, 50));

    recorder.add_resource(Resource::empty(clock.now() - TimeDelta::milliseconds(20_000)));

    assert_eq!(recorder.snapshot().resources.len(), 0);
}

#[test]
fn test_resource_without_page_ref_keeps_no_pages() {
    let (clock, mut recorder) = create_recorder(&create_test_config(600_000, 50));

    recorder.on_navigation_changed("https://a.test/", "A");
    recorder.on_navigation_changed("https://b.test/", "B");
    recorder.add_resource(Resource::empty(clock.now()));

    assert_eq!(recorder.snapshot().pages.len(), 0);
}

#[test]
fn test_referenced_page_survives_pruning() {
    let (clock, mut recorder) = create_recorder(&create_test_config(600_000, 50));

    let first = recorder.on_navigation_changed("https://a.test/", "A");
    recorder.on_navigation_changed("https://b.test/", "B");
    assert!(recorder.snapshot().pages.is_empty());

    // Pages pruned above are gone for good; navigate again
    let first_again = recorder.on_navigation_changed("https://a.test/", "A");
    recorder.on_navigation_changed("https://b.test/", "B");
    assert_ne!(first, first_again);

    recorder.add_resource(Resource::empty(clock.now()).with_page_ref(first_again.clone()));
    let window = recorder.snapshot();
    assert_eq!(window.pages.len(), 1);
    assert_eq!(window.pages[0].page_ref, first_again);
}

#[test]
fn test_recorded_resources_escape_eviction() {
    let (clock, mut recorder) = create_recorder(&create_test_config(10_000, 50));
    recorder.start_recording();

    for _ in 0..100 {
        recorder.add_resource(Resource::empty(clock.now() - TimeDelta::minutes(20)));
    }

    assert_eq!(recorder.snapshot().resources.len(), 0);
    assert_eq!(recorder.session().resources().len(), 100);
}

#[test]
fn test_correlation_order_independence() {
    let config = create_test_config(600_000, 50);

    let (_, mut forward) = create_recorder(&config);
    forward.on_navigation_changed("https://app.test/", "App");
    xhr(&mut forward, 1, "https://api.test/items", false);

    let (_, mut reverse) = create_recorder(&config);
    reverse.on_navigation_changed("https://app.test/", "App");
    xhr(&mut reverse, 1, "https://api.test/items", true);

    let a = forward.snapshot().resources.to_vec();
    let b = reverse.snapshot().resources.to_vec();
    assert_eq!(a.len(), 1);
    assert_eq!(a, b);
    assert!(a[0].is_complete());
}

#[test]
fn test_recording_lifecycle_and_export() {
    let (clock, mut recorder) = create_recorder(&create_test_config(600_000, 50));

    recorder.start_new_recording();
    recorder.on_navigation_changed("https://app.test/", "App");
    xhr(&mut recorder, 1, "https://api.test/one", false);
    assert_eq!(recorder.session().resources().len(), 1);
    assert_eq!(recorder.session().pages().len(), 1);

    recorder.start_new_recording();
    assert_eq!(recorder.session().resources().len(), 0);
    assert_eq!(recorder.session().pages().len(), 0);

    recorder.on_navigation_changed("https://app.test/next", "Next");
    xhr(&mut recorder, 2, "https://api.test/two?page=2", false);

    recorder.stop_recording();
    xhr(&mut recorder, 3, "https://api.test/three", false);
    assert_eq!(recorder.session().resources().len(), 1);

    recorder.start_recording();
    xhr(&mut recorder, 4, "https://api.test/four", false);
    assert_eq!(recorder.session().resources().len(), 2);

    clock.advance(Duration::from_secs(3600));

    let recorded = recorder.export_recorded();
    assert_eq!(recorded.log.pages.len(), 1);
    assert_eq!(recorded.log.pages[0].title, "Next (https://app.test/next)");
    assert_eq!(recorded.log.entries.len(), 2);
    assert_eq!(recorded.log.entries[0].request.query_string[0].name, "page");
    assert_eq!(recorded.log.entries[0].request.headers[0].name, "accept");

    let live = recorder.export_live();
    assert!(live.log.entries.is_empty());
    assert!(live.log.pages.is_empty());
}

#[test]
fn test_requests_before_any_navigation_are_not_exported() {
    let (_, mut recorder) = create_recorder(&create_test_config(600_000, 50));

    xhr(&mut recorder, 1, "https://api.test/early", false);

    let window = recorder.snapshot();
    assert_eq!(window.resources.len(), 1);
    assert!(window.resources[0].page_ref.is_none());
    assert!(recorder.export_live().log.entries.is_empty());
}

#[test]
fn test_replay_capture_log() {
    let log = r#"
{"location":{"url":"https://app.test/","title":"App"}}
{"location":{"url":"https://app.test/","title":"App"}}
"start_new_recording"
{"network":{"hook":"request_start","call_id":7,"method":"POST","url":"https://api.test/save?draft=true"}}
{"network":{"hook":"header_set","call_id":7,"name":"Content-Type","value":"text/plain"}}
{"network":{"hook":"send","call_id":7,"body":"hello"}}
{"network":{"hook":"timing","name":"https://api.test/save?draft=true","initiatorType":"xmlhttprequest","duration":21.5,"connectStart":1,"connectEnd":5}}
{"network":{"hook":"complete","call_id":7,"response":{"status":204,"statusText":"No Content","allResponseHeaders":""}}}
"#;

    let (_, mut recorder) = create_recorder(&create_test_config(600_000, 50));
    for event in parse_capture_log(log).unwrap() {
        recorder.apply(event);
    }

    let har = recorder.export_live();
    assert_eq!(har.log.pages.len(), 1);
    assert_eq!(har.log.pages[0].id, PageRef::new("page_0").to_string());
    assert_eq!(har.log.entries.len(), 1);

    let entry = &har.log.entries[0];
    assert_eq!(entry.time, 21.5);
    assert_eq!(entry.timings.connect, 4.0);
    assert_eq!(entry.response.status, 204);
    let post = entry.request.post_data.as_ref().unwrap();
    assert_eq!(post.mime_type, "text/plain");
    assert_eq!(post.text, "hello");

    // The page was created before recording started
    assert!(recorder.export_recorded().log.pages.is_empty());
    assert_eq!(recorder.export_recorded().log.entries.len(), 0);
    assert_eq!(recorder.session().resources().len(), 1);
}

#[tokio::test]
async fn test_service_end_to_end() {
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
    let config = create_test_config(600_000, 50);
    let recorder =
        HarRecorder::with_sources(&config, clock.clone(), Arc::new(SequentialIdGenerator::new()));
    let (service, handle) = RecorderService::new(recorder, config.channel_capacity);
    let task = tokio::spawn(service.run());

    handle.navigate("https://app.test/", "App").await.unwrap();
    for call_id in 0..10u64 {
        let url = format!("https://api.test/{call_id}");
        handle
            .hook(HookEvent::RequestStart {
                call_id,
                method: "GET".to_string(),
                url: url.clone(),
            })
            .await
            .unwrap();
        handle
            .hook(HookEvent::Send {
                call_id,
                body: None,
            })
            .await
            .unwrap();
        handle
            .hook(HookEvent::Complete {
                call_id,
                response: RawResponse {
                    status: 200,
                    status_text: "OK".to_string(),
                    response_url: None,
                    response_text: None,
                    all_response_headers: String::new(),
                },
            })
            .await
            .unwrap();
        handle
            .hook(HookEvent::Timing(TimingEntry {
                name: url,
                initiator_type: XHR_INITIATOR.to_string(),
                ..Default::default()
            }))
            .await
            .unwrap();
    }

    let har = handle.export_live().await.unwrap();
    assert_eq!(har.log.entries.len(), 10);
    assert_eq!(handle.stats().await.unwrap().pending_halves, 0);

    handle.shutdown();
    task.await.unwrap();
}
