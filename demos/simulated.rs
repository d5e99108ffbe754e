use cable_guardian::math::{pose_matrix_from_yaw, rad_to_deg, PoseMatrix, Quaternion};
use cable_guardian::runtime::{
    DeviceEnumerator, OculusRuntime, OculusSessionStatus, OpenVrEvent, OpenVrRuntime, ProcessProbe,
};
use cable_guardian::{
    AudioDevice, ConnectionEvent, EventReceiver, Monitor, MonitorConfig, MonitorEvent, NativeBackends, Profile,
    RuntimeError, VrApi,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

const LOG_LINES: usize = 200;

/// A head spinning at a constant rate
#[derive(Clone)]
struct SimulatedHead {
    started: Instant,
    /// Radians per second, positive is counter-clockwise
    speed: f64,
}

impl SimulatedHead {
    fn yaw(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * self.speed + PI).rem_euclid(TAU) - PI
    }
}

struct SimulatedOculus(SimulatedHead);

impl OculusRuntime for SimulatedOculus {
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn shutdown(&mut self) {}

    fn session_status(&mut self) -> Result<OculusSessionStatus, RuntimeError> {
        Ok(OculusSessionStatus {
            hmd_present: true,
            hmd_mounted: true,
            ..Default::default()
        })
    }

    fn head_orientation(&mut self) -> Result<Quaternion, RuntimeError> {
        Ok(Quaternion::from_yaw(self.0.yaw()))
    }

    fn audio_output_device_id(&mut self) -> Option<String> {
        Some("{sim-headphones}".to_string())
    }
}

struct SimulatedOpenVr(SimulatedHead);

impl OpenVrRuntime for SimulatedOpenVr {
    fn is_installed(&self) -> bool {
        true
    }

    fn initialize(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn shutdown(&mut self) {}

    fn poll_event(&mut self) -> Option<OpenVrEvent> {
        None
    }

    fn acknowledge_quit(&mut self) {}

    fn is_hmd_connected(&mut self) -> bool {
        true
    }

    fn hmd_pose(&mut self) -> Option<PoseMatrix> {
        Some(pose_matrix_from_yaw(self.0.yaw(), [0.0, 1.7, 0.0]))
    }

    fn add_manifest(&mut self, _path: &std::path::Path) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn set_auto_launch(&mut self, _app_key: &str, _enabled: bool) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn auto_launch(&mut self, _app_key: &str) -> Result<bool, RuntimeError> {
        Ok(false)
    }
}

struct EverythingRunning;

impl ProcessProbe for EverythingRunning {
    fn is_running(&self, _name: &str) -> bool {
        true
    }
}

struct SimulatedDevices;

impl DeviceEnumerator for SimulatedDevices {
    fn output_devices(&mut self) -> Result<Vec<AudioDevice>, RuntimeError> {
        Ok(vec![
            AudioDevice::new("{sim-speakers}", "Speakers (Simulated)"),
            AudioDevice::new("{sim-headphones}", "Headphones (Simulated HMD)"),
        ])
    }
}

struct App {
    monitor: Monitor,
    events: EventReceiver<MonitorEvent>,
    log: VecDeque<String>,
    status_message: String,
}

impl App {
    fn new(head: SimulatedHead) -> Result<Self, Box<dyn std::error::Error>> {
        let backends = NativeBackends {
            oculus: Box::new(SimulatedOculus(head.clone())),
            openvr: Box::new(SimulatedOpenVr(head)),
            processes: Arc::new(EverythingRunning),
            audio: Box::new(SimulatedDevices),
        };
        let config = MonitorConfig {
            play_jingle_on_interaction: true,
            ..Default::default()
        };
        let monitor = Monitor::new(config, backends, None)?;
        let events = monitor.subscribe();

        Ok(Self {
            monitor,
            events,
            log: VecDeque::new(),
            status_message: "s: switch API, r: reset, a: alarm in 3s, c: cancel alarm, q: quit".to_string(),
        })
    }

    fn switch_api(&mut self) {
        let next = match self.monitor.active_api() {
            Some(VrApi::OculusVr) => VrApi::OpenVr,
            _ => VrApi::OculusVr,
        };
        self.monitor.apply_profile(&Profile::new(next.to_string(), next));
    }

    fn drain_events(&mut self) {
        for event in self.events.drain() {
            let line = match event {
                MonitorEvent::Connection(ConnectionEvent::StatusChanged { api, status, message, .. }) => {
                    format!("[{}] {}: {}", api, status, message)
                }
                MonitorEvent::Connection(other) => format!("{:?}", other),
                MonitorEvent::Alert(alert) => format!("ALERT {:?} on {:?}", alert.action, alert.device),
                MonitorEvent::RestartRequested(state) => format!("Restart requested at half-turn {}", state.half_turn),
            };
            self.log.push_front(line);
            self.log.truncate(LOG_LINES);
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(7), Constraint::Min(0), Constraint::Length(3)])
        .split(f.size());

    render_tracking(f, app, chunks[0]);
    render_log(f, app, chunks[1]);

    let status = Paragraph::new(app.status_message.as_str()).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[2]);
}

fn render_tracking(f: &mut Frame, app: &App, area: Rect) {
    let tracker = app.monitor.tracker();
    let (yaw, unwrapped, summary) = {
        let t = tracker.lock();
        (t.yaw_value(), t.unwrapped_yaw(), t.summary())
    };
    let connection = match app.monitor.active_api() {
        Some(api) => {
            let snapshot = app.monitor.connection_snapshot(api);
            format!("{} - {}", api, snapshot.status)
        }
        None => "none".to_string(),
    };

    let label = Style::default().fg(Color::Yellow);
    let lines = vec![
        Line::from(vec![Span::styled("Connection: ", label), Span::raw(connection)]),
        Line::from(vec![Span::styled("Yaw: ", label), Span::raw(format!("{:.1}°", rad_to_deg(yaw)))]),
        Line::from(vec![
            Span::styled("Unwrapped: ", label),
            Span::raw(format!("{:.1}°", rad_to_deg(unwrapped))),
        ]),
        Line::from(vec![Span::styled("Half-turns: ", label), Span::raw(summary.to_string())]),
    ];

    let block = Block::default()
        .title(" Cable Guardian (simulated) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app.log.iter().map(|line| ListItem::new(line.as_str())).collect();
    let list = List::new(items).block(Block::default().title(" Events ").borders(Borders::ALL));
    f.render_widget(list, area);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to a file so they don't tear the terminal UI
    let log_file = std::fs::File::create("simulated.log")?;
    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let head = SimulatedHead {
        started: Instant::now(),
        speed: PI / 4.0,
    };
    let mut app = App::new(head)?;
    app.switch_api();
    app.monitor.start().await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    app.monitor.stop().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {}", err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.drain_events();
        terminal.draw(|f| ui(f, app))?;

        // Yield so the monitor tasks keep running between redraws
        tokio::time::sleep(Duration::from_millis(10)).await;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('s') => app.switch_api(),
                        KeyCode::Char('r') => app.monitor.reset_turns(),
                        KeyCode::Char('a') => app.monitor.alarm_in(Duration::from_secs(3)),
                        KeyCode::Char('c') => app.monitor.cancel_alarm(),
                        _ => {}
                    }
                }
            }
        }
    }
}
