use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::error;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{
        block::{Position, Title},
        Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use std::{
    io,
    time::{Duration, Instant},
};

use studyscribe::{
    dummy_tracker::{DummyHands, DummyTracker},
    gui::{apply, command_for, MonitorError},
    index::UserList,
    session::Session,
};

struct App {
    session: Session,
    tracker: DummyTracker,
    hands: DummyHands,
    started: Instant,
    objects: Vec<(f64, f64)>,
    held: Vec<(f64, f64)>,
}

impl App {
    fn new(session: Session) -> App {
        App {
            session,
            tracker: DummyTracker::new(),
            hands: DummyHands::default(),
            started: Instant::now(),
            objects: vec![],
            held: vec![],
        }
    }

    fn on_tick(&mut self) {
        let secs = self.started.elapsed().as_secs_f64();
        self.session.update_head(self.tracker.pose_at(secs));
        if self.session.is_logging() {
            self.hands.step(self.session.scene_mut());
        }
        if let Err(e) = self.session.tick() {
            error!("{}", e);
        }

        let scene = self.session.resident().scene();
        self.objects = scene
            .snapshot(secs)
            .objects()
            .iter()
            .map(|o| (o.position.x as f64, o.position.z as f64))
            .collect();
        self.held = scene
            .manipulated_snapshot(secs)
            .objects()
            .iter()
            .map(|o| (o.position.x as f64, o.position.z as f64))
            .collect();
    }
}

pub fn engage_gui(session: Session, tick_rate: f64) -> Result<(), MonitorError> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // create app and run it
    let tick_rate = Duration::from_secs_f64(1.0 / tick_rate.max(1.0));
    let app = App::new(session);
    let res = run_app(&mut terminal, app, tick_rate);

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> Result<(), MonitorError> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(command) = command_for(key.code) {
                        // refused commands already show up on the status board
                        match apply(command, &mut app.session) {
                            Ok(true) => {}
                            Ok(false) => return Ok(()),
                            Err(e) => error!("{}", e),
                        }
                    }
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

fn describe<T: ToString>(value: Option<T>) -> String {
    value.map_or("-".to_owned(), |v| v.to_string())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(f.size());

    let session = &app.session;
    let resident = session.resident();
    let index = resident.index();
    let mut lines = vec![
        Line::from(vec![
            "Phase    ".into(),
            Span::styled(describe(session.phase()), Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec!["Track    ".into(), describe(session.track()).into()]),
        Line::from(vec!["Button   ".into(), describe(session.button()).into()]),
        Line::from(vec!["Logging  ".into(), describe(session.logging_state()).into()]),
        Line::from(vec![
            "User     ".into(),
            describe(resident.current_set().map(|s| s.user_id())).into(),
        ]),
        Line::from(format!(
            "Users    {} new, {} incomplete, {} complete",
            index.list(UserList::New).len(),
            index.list(UserList::Incomplete).len(),
            index.list(UserList::Complete).len()
        )),
        Line::from(""),
    ];
    let history: Vec<&str> = resident.status().history().collect();
    lines.extend(history.iter().rev().take(12).map(|msg| {
        if msg.starts_with("ERROR") {
            Line::from(Span::styled(msg.to_string(), Style::default().fg(Color::Red)))
        } else {
            Line::from(msg.to_string())
        }
    }));

    let keys = " <Space> button  <P>/<L> track  <E> end  <Z> pause  <M> menu  <N> new user  <Q> quit ";
    let status = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Title::from(" StudyScribe ".magenta().bold()))
                .title(Title::from(keys).position(Position::Bottom))
                .borders(Borders::ALL),
        );
    f.render_widget(status, chunks[0]);

    let chart = Chart::new(vec![
        Dataset::default()
            .name("Objects")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Cyan))
            .data(&app.objects),
        Dataset::default()
            .name("Held")
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Red))
            .data(&app.held),
    ])
    .block(Block::default().title("Table").borders(Borders::ALL))
    .x_axis(
        Axis::default()
            .title(Span::styled("X", Style::default().fg(Color::Red)))
            .style(Style::default().fg(Color::White))
            .bounds([-1.0, 1.0])
            .labels(
                ["-1.0", "0.0", "1.0"]
                    .iter()
                    .cloned()
                    .map(Span::from)
                    .collect(),
            ),
    )
    .y_axis(
        Axis::default()
            .title(Span::styled("Z", Style::default().fg(Color::Red)))
            .style(Style::default().fg(Color::White))
            .bounds([-1.0, 1.0])
            .labels(
                ["-1.0", "0.0", "1.0"]
                    .iter()
                    .cloned()
                    .map(Span::from)
                    .collect(),
            ),
    );

    f.render_widget(chart, chunks[1]);
}
