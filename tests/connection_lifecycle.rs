mod common;

use approx::assert_abs_diff_eq;
use cable_guardian::runtime::OpenVrEvent;
use cable_guardian::{
    AutoStartManifest, ConnectionEvent, ConnectionStatus, GuardianError, OculusConnection, OculusStatus,
    OpenVrConnection, OpenVrStatus, SubStatus, VrApi, VrConnection,
};
use common::{fake_oculus, fake_openvr, FakeProcesses};

fn statuses(events: &[ConnectionEvent]) -> Vec<ConnectionStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::StatusChanged { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

// ── Oculus ──────────────────────────────────────────────────────────

#[test]
fn oculus_opens_to_all_ok() {
    let (runtime, state) = fake_oculus();
    let mut conn = OculusConnection::new(runtime, FakeProcesses::with(&[]), "oculusclient", 10);
    let mut rx = conn.subscribe();

    conn.open();

    assert_eq!(conn.status(), ConnectionStatus::AllOk);
    assert_eq!(conn.sub_status(), SubStatus::Oculus(OculusStatus::AllOk));
    assert_eq!(
        statuses(&rx.drain()),
        vec![ConnectionStatus::Initializing, ConnectionStatus::AllOk]
    );

    // Already connected: nothing to do
    conn.open();
    assert_eq!(state.lock().init_calls, 1);
}

#[test]
fn oculus_init_limit_is_terminal() {
    let (runtime, state) = fake_oculus();
    state.lock().fail_init = true;
    let mut conn = OculusConnection::new(runtime, FakeProcesses::with(&[]), "oculusclient", 3);
    let mut rx = conn.subscribe();

    conn.open();
    assert_eq!(conn.status(), ConnectionStatus::NotOk);
    assert_eq!(conn.sub_status(), SubStatus::Oculus(OculusStatus::InitFailed));

    for _ in 0..5 {
        conn.maintain();
    }
    conn.open();
    conn.close();

    assert_eq!(conn.status(), ConnectionStatus::InitLimitReached);
    assert_eq!(conn.snapshot().init_attempts, 3);
    assert_eq!(state.lock().init_calls, 3);

    let seen = statuses(&rx.drain());
    assert_eq!(
        seen.iter()
            .filter(|s| **s == ConnectionStatus::InitLimitReached)
            .count(),
        1
    );
    assert_eq!(seen.last(), Some(&ConnectionStatus::InitLimitReached));
}

#[test]
fn oculus_waits_for_home_when_required() {
    let (runtime, state) = fake_oculus();
    let processes = FakeProcesses::with(&[]);
    let mut conn = OculusConnection::new(runtime, processes.clone(), "OculusClient", 10);
    conn.set_require_home(true);

    conn.open();
    assert_eq!(conn.status(), ConnectionStatus::NotOk);
    assert_eq!(conn.sub_status(), SubStatus::Oculus(OculusStatus::HomeNotRunning));

    processes.start("oculusclient");
    conn.maintain();
    assert_eq!(conn.status(), ConnectionStatus::AllOk);
    assert_eq!(state.lock().init_calls, 1);

    // Home closed while running; noticed on the next maintenance pass only
    processes.kill("oculusclient");
    assert!(conn.sample().is_some());
    conn.maintain();
    assert_eq!(conn.sub_status(), SubStatus::Oculus(OculusStatus::HomeNotRunning));

    conn.set_require_home(false);
    assert_eq!(conn.status(), ConnectionStatus::AllOk);
}

#[test]
fn oculus_quit_releases_session_and_reconnects() {
    let (runtime, state) = fake_oculus();
    let mut conn = OculusConnection::new(runtime, FakeProcesses::with(&[]), "oculusclient", 10);
    conn.open();
    let mut rx = conn.subscribe();

    state.lock().status.should_quit = true;
    assert!(conn.sample().is_none());

    assert_eq!(conn.status(), ConnectionStatus::NotOk);
    assert!(conn.sub_status().is_controlled_quit());
    assert!(!state.lock().session_live);
    assert!(rx.drain().contains(&ConnectionEvent::StatusChangedToNotOk {
        api: VrApi::OculusVr,
        status: ConnectionStatus::NotOk,
        sub_status: SubStatus::Oculus(OculusStatus::OculusVrQuit),
    }));

    state.lock().status.should_quit = false;
    conn.maintain();
    assert_eq!(conn.status(), ConnectionStatus::AllOk);
    assert_eq!(state.lock().init_calls, 2);
}

#[test]
fn oculus_sample_reports_yaw_and_presence() {
    let (runtime, state) = fake_oculus();
    let mut conn = OculusConnection::new(runtime, FakeProcesses::with(&[]), "oculusclient", 10);
    conn.open();
    let mut rx = conn.subscribe();

    {
        let mut s = state.lock();
        s.yaw = -2.5;
        s.status.hmd_mounted = true;
    }
    let sample = conn.sample().unwrap();
    assert_abs_diff_eq!(sample.yaw, -2.5, epsilon = 1e-9);
    assert!(sample.user_present);

    state.lock().status.hmd_mounted = false;
    assert!(!conn.sample().unwrap().user_present);

    assert_eq!(
        rx.drain(),
        vec![
            ConnectionEvent::HmdUserInteractionStarted { api: VrApi::OculusVr },
            ConnectionEvent::HmdUserInteractionStopped { api: VrApi::OculusVr },
        ]
    );
}

#[test]
fn oculus_closed_connection_is_not_sampled() {
    let (runtime, state) = fake_oculus();
    let mut conn = OculusConnection::new(runtime, FakeProcesses::with(&[]), "oculusclient", 10);

    assert!(conn.sample().is_none());
    conn.open();
    conn.close();
    conn.close();

    assert!(conn.sample().is_none());
    assert_eq!(conn.status(), ConnectionStatus::Closed);
    assert!(!state.lock().session_live);
}

// ── OpenVR ──────────────────────────────────────────────────────────

fn openvr(processes: &[&str]) -> (OpenVrConnection, std::sync::Arc<parking_lot::Mutex<common::OpenVrState>>) {
    let (runtime, state) = fake_openvr();
    let conn = OpenVrConnection::new(
        runtime,
        FakeProcesses::with(processes),
        "vrserver",
        AutoStartManifest::default(),
        3,
    );
    (conn, state)
}

#[test]
fn openvr_waits_for_server_without_counting_attempts() {
    let (runtime, state) = fake_openvr();
    let processes = FakeProcesses::with(&[]);
    let mut conn = OpenVrConnection::new(runtime, processes.clone(), "vrserver", AutoStartManifest::default(), 3);

    conn.open();
    for _ in 0..10 {
        conn.maintain();
    }

    assert_eq!(conn.status(), ConnectionStatus::NotOk);
    assert_eq!(conn.sub_status(), SubStatus::OpenVr(OpenVrStatus::SteamVrNotRunning));
    assert_eq!(conn.snapshot().init_attempts, 0);
    assert_eq!(state.lock().init_calls, 0);

    processes.start("vrserver");
    conn.maintain();
    assert_eq!(conn.status(), ConnectionStatus::AllOk);
}

#[test]
fn openvr_not_installed() {
    let (mut conn, state) = openvr(&["vrserver"]);
    state.lock().installed = false;

    conn.open();

    assert_eq!(conn.sub_status(), SubStatus::OpenVr(OpenVrStatus::RuntimeUnavailable));
    assert_eq!(state.lock().init_calls, 0);
}

#[test]
fn openvr_init_limit_is_terminal() {
    let (mut conn, state) = openvr(&["vrserver"]);
    state.lock().fail_init = true;
    let mut rx = conn.subscribe();

    conn.open();
    for _ in 0..5 {
        conn.maintain();
    }

    assert_eq!(conn.status(), ConnectionStatus::InitLimitReached);
    assert_eq!(state.lock().init_calls, 3);

    let seen = statuses(&rx.drain());
    let limit_at = seen
        .iter()
        .position(|s| *s == ConnectionStatus::InitLimitReached)
        .unwrap();
    assert_eq!(limit_at, seen.len() - 1);
}

#[test]
fn openvr_missing_headset() {
    let (mut conn, state) = openvr(&["vrserver"]);
    state.lock().hmd_connected = false;

    conn.open();
    assert_eq!(conn.sub_status(), SubStatus::OpenVr(OpenVrStatus::HmdNotFound));
    assert_eq!(conn.snapshot().init_attempts, 0);

    state.lock().hmd_connected = true;
    conn.maintain();
    assert_eq!(conn.status(), ConnectionStatus::AllOk);
    assert_eq!(state.lock().init_calls, 1);
}

#[test]
fn openvr_quit_event_releases_handle() {
    let (mut conn, state) = openvr(&["vrserver"]);
    conn.open();
    let mut rx = conn.subscribe();

    state.lock().events.push_back(OpenVrEvent::Quit);
    assert!(conn.sample().is_none());

    assert_eq!(conn.status(), ConnectionStatus::NotOk);
    assert_eq!(conn.sub_status(), SubStatus::OpenVr(OpenVrStatus::SteamVrQuit));
    assert_eq!(state.lock().quit_acknowledged, 1);
    assert!(!state.lock().handle_live);
    assert!(rx
        .drain()
        .iter()
        .any(|e| matches!(e, ConnectionEvent::StatusChangedToNotOk { .. })));
}

#[test]
fn openvr_proximity_drives_interaction_events() {
    let (mut conn, state) = openvr(&["vrserver"]);
    conn.open();
    let mut rx = conn.subscribe();

    state.lock().events.push_back(OpenVrEvent::UserInteractionStarted);
    state.lock().yaw = Some(1.25);
    let sample = conn.sample().unwrap();
    assert!(sample.user_present);
    assert_abs_diff_eq!(sample.yaw, 1.25, epsilon = 1e-6);

    state.lock().events.push_back(OpenVrEvent::UserInteractionEnded);
    assert!(!conn.sample().unwrap().user_present);

    assert_eq!(
        rx.drain(),
        vec![
            ConnectionEvent::HmdUserInteractionStarted { api: VrApi::OpenVr },
            ConnectionEvent::HmdUserInteractionStopped { api: VrApi::OpenVr },
        ]
    );
}

#[test]
fn openvr_invalid_pose_skips_sample() {
    let (mut conn, state) = openvr(&["vrserver"]);
    conn.open();

    state.lock().yaw = None;
    assert!(conn.sample().is_none());
    assert_eq!(conn.status(), ConnectionStatus::AllOk);
}

#[test]
fn openvr_autostart_needs_a_handle() {
    let (mut conn, state) = openvr(&["vrserver"]);

    assert!(matches!(
        conn.set_auto_start(true),
        Err(GuardianError::NotConnected(VrApi::OpenVr))
    ));

    conn.open();
    conn.set_auto_start(true).unwrap();

    assert!(conn.is_auto_start_enabled().unwrap());
    let manifest = AutoStartManifest::default();
    assert_eq!(state.lock().manifests, vec![manifest.manifest_path.clone()]);
    assert_eq!(state.lock().auto_launch.get(&manifest.app_key), Some(&true));

    conn.set_auto_start(false).unwrap();
    assert!(!conn.is_auto_start_enabled().unwrap());
}
