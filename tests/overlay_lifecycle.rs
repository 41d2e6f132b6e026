mod common;

use std::time::Duration;

use common::{fast_config, monitor, wait_until, FakeBackend, FakeDetector, FakeSource};
use screen_person_rs::app::{AppContext, AppController, StopOutcome};
use screen_person_rs::detection::{Detection, LoopConfig, LoopExit, LoopState};
use screen_person_rs::renderer::OverlayRenderer;

fn person() -> Detection {
    Detection::person(10, 10, 50, 90, 0.87)
}

fn controller(join_timeout: Duration) -> (AppController<FakeBackend>, FakeBackend) {
    let backend = FakeBackend::default();
    let ctx = AppContext::new(join_timeout);
    (AppController::new(ctx, backend.clone()), backend)
}

#[test]
fn single_detection_draws_one_box_and_label() {
    let backend = FakeBackend::default();
    let mut renderer = OverlayRenderer::new(backend.clone());
    renderer.create(&monitor()).unwrap();
    renderer.render(&[person()]);

    let scene = renderer.scene();
    assert_eq!(scene.box_count(), 1);
    assert_eq!(scene.boxes().collect::<Vec<_>>(), vec![(10.0, 10.0, 50.0, 90.0)]);
    let labels: Vec<&str> = scene.labels().collect();
    assert_eq!(labels.len(), 1);
    assert!(labels[0].contains("0.87"));
    assert_eq!(backend.log.borrow().presents, 1);
}

#[test]
fn zero_detections_draw_nothing() {
    let backend = FakeBackend::default();
    let mut renderer = OverlayRenderer::new(backend.clone());
    renderer.create(&monitor()).unwrap();
    renderer.render(&[person()]);
    renderer.render(&[]);
    assert_eq!(renderer.scene().box_count(), 0);
    let log = backend.log.borrow();
    assert!(log.last_scene.as_ref().map(|s| s.is_empty()).unwrap_or(false));
}

#[test]
fn render_is_idempotent() {
    let mut renderer = OverlayRenderer::new(FakeBackend::default());
    renderer.create(&monitor()).unwrap();
    let batch = vec![person(), Detection::person(200, 100, 260, 300, 0.55)];
    renderer.render(&batch);
    let first = renderer.scene().clone();
    renderer.render(&batch);
    assert_eq!(renderer.scene(), &first);
    assert_eq!(renderer.scene().box_count(), 2);
}

#[test]
fn create_replaces_existing_window() {
    let backend = FakeBackend::default();
    let mut renderer = OverlayRenderer::new(backend.clone());
    renderer.create(&monitor()).unwrap();
    renderer.render(&[person()]);
    renderer.create(&monitor()).unwrap();

    assert!(renderer.is_alive());
    assert!(renderer.scene().is_empty());
    let log = backend.log.borrow();
    assert_eq!(log.opened, 2);
    assert_eq!(log.closed, 1);
}

#[test]
fn destroy_is_idempotent() {
    let backend = FakeBackend::default();
    let mut renderer = OverlayRenderer::new(backend.clone());
    renderer.create(&monitor()).unwrap();
    renderer.destroy();
    renderer.destroy();
    renderer.render(&[person()]);
    assert!(!renderer.is_alive());
    assert_eq!(backend.log.borrow().closed, 1);
}

#[test]
fn stop_twice_closes_window_once() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::default(),
        fast_config(),
        2,
    )
    .unwrap();
    assert!(app.tick());

    assert!(wait_until(Duration::from_secs(2), || {
        app.context().loop_state() == LoopState::Running
    }));
    match app.stop() {
        StopOutcome::Joined(report) => assert_eq!(report.exit, LoopExit::Stopped),
        other => panic!("expected Joined, got {:?}", other),
    }
    assert_eq!(app.context().loop_state(), LoopState::Stopped);
    assert_eq!(app.stop(), StopOutcome::AlreadyStopped);
    assert!(!app.tick());
    assert_eq!(backend.log.borrow().closed, 1);
    assert!(app.context().ui_closed());
}

#[test]
fn tick_renders_latest_batch() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::returning(vec![person()]),
        fast_config(),
        2,
    )
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        app.tick();
        app.last_frame().is_some()
    }));
    assert_eq!(app.renderer().scene().box_count(), 1);
    assert!(backend.log.borrow().presents >= 1);
    app.stop();
}

#[test]
fn escape_requests_stop() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::default(),
        fast_config(),
        2,
    )
    .unwrap();
    backend.log.borrow_mut().escape = true;

    assert!(!app.tick());
    assert!(app.context().stop_requested());
    assert!(!app.context().running().is_running());
    assert!(matches!(app.stop(), StopOutcome::Joined(_)));
}

#[test]
fn window_close_requests_stop() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::default(),
        fast_config(),
        2,
    )
    .unwrap();
    backend.log.borrow_mut().close_requested = true;
    assert!(!app.tick());
    app.stop();
    assert_eq!(backend.log.borrow().closed, 1);
}

#[test]
fn external_stop_is_seen_by_event_loop() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::default(),
        fast_config(),
        2,
    )
    .unwrap();

    // 模拟信号处理线程
    let ctx = app.context().clone();
    let outcome = std::thread::spawn(move || ctx.stop()).join().unwrap();
    assert!(matches!(outcome, StopOutcome::Joined(_)));

    assert!(!app.tick());
    assert_eq!(app.stop(), StopOutcome::AlreadyStopped);
    assert_eq!(backend.log.borrow().closed, 1);
    assert!(app.context().wait_ui_closed(Duration::from_millis(10)));
}

#[test]
fn dead_window_ends_event_loop() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::default(),
        fast_config(),
        2,
    )
    .unwrap();
    backend.log.borrow_mut().fail_present = true;

    // 第一次 tick 画图失败, 窗口失效; 下一次 tick 退出
    app.tick();
    assert!(!app.renderer().is_alive());
    assert!(!app.tick());
    assert!(app.context().stop_requested());
    app.stop();
}

#[test]
fn repeated_failures_stop_the_app() {
    let (mut app, _backend) = controller(Duration::from_secs(1));
    let config = LoopConfig {
        max_consecutive_failures: 3,
        ..fast_config()
    };
    app.start(
        &monitor(),
        || {
            Ok(FakeSource {
                always_fail: true,
                ..FakeSource::default()
            }
            .bind())
        },
        FakeDetector::default(),
        config,
        2,
    )
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || !app.tick()));
    match app.stop() {
        StopOutcome::Joined(report) => assert_eq!(report.exit, LoopExit::TooManyFailures(3)),
        other => panic!("expected Joined, got {:?}", other),
    }
}

#[test]
fn slow_worker_times_out() {
    let (mut app, backend) = controller(Duration::from_millis(20));
    let detector = FakeDetector {
        delay: Duration::from_millis(500),
        ..FakeDetector::default()
    };
    let calls = detector.clone();
    app.start(&monitor(), || Ok(FakeSource::default().bind()), detector, fast_config(), 2)
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || calls.calls() >= 1));
    assert_eq!(app.stop(), StopOutcome::TimedOut);
    assert_eq!(backend.log.borrow().closed, 1);
}

#[test]
fn stop_before_start_skips_worker() {
    let (mut app, backend) = controller(Duration::from_secs(1));
    app.context().request_stop();
    app.start(
        &monitor(),
        || Ok(FakeSource::default().bind()),
        FakeDetector::default(),
        fast_config(),
        2,
    )
    .unwrap();
    assert!(!app.tick());
    assert_eq!(app.stop(), StopOutcome::NoWorker);
    assert_eq!(backend.log.borrow().opened, 0);
}
