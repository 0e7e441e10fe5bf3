//! Headless driver: runs one participant through a track with synthetic
//! head and hand data, or inspects files a session left behind.

use clap::Parser;
use log::{error, info, warn};
use std::{
    path::PathBuf,
    process::ExitCode,
    time::{Duration, Instant},
};
use studyscribe::{
    args::{CommandTask, InspectCommand, RunCommand, ScribeArgs, StoreArgs},
    dummy_tracker::{demo_record, DummyHands, DummyTracker, TableSetter},
    error::SessionError,
    index::{ApplicationIndex, UserList},
    phase::Track,
    session::Session,
    store::inspect_file,
};

// Example:
// cargo run --bin studyscribe --
//                            --root     /tmp/study
//                            --backup-period 5 run
//                            --user     12
//                            --group    b
//                            --track    Locations
//                            --seconds  20

fn main() -> ExitCode {
    env_logger::init();
    let args = ScribeArgs::parse();

    let result = match args.command {
        CommandTask::Run(cmd) => run(&args.store, &cmd),
        CommandTask::Inspect(cmd) => return inspect(&cmd),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(store: &StoreArgs, cmd: &RunCommand) -> Result<(), Box<dyn std::error::Error>> {
    let settings = store.settings()?;
    let mut builder = Session::builder(store.root.clone())
        .set_settings(settings)
        .add_submanager(Box::new(TableSetter::default()));
    if let Some(bundled) = &store.bundled {
        builder = builder.set_bundled(bundled.clone());
    }
    let mut session = builder.build()?;

    if session.resident().roster().find(&cmd.user_id).is_some() {
        session.select_user_by_id(&cmd.user_id)?;
    } else {
        info!("registering user {}", cmd.user_id);
        session.set_and_save_new_settings(demo_record(&cmd.user_id, cmd.group, cmd.interval))?;
    }

    let mut tracks = vec![cmd.track];
    let token = ApplicationIndex::user_token(&cmd.user_id);
    if cmd.track.opens_at() > UserList::New
        && session.resident().index().position(&token) == Some(UserList::New)
    {
        info!("user {} has not done the {} track yet", cmd.user_id, Track::Prices);
        tracks.insert(0, Track::Prices);
    }

    let mut driver = Driver::new(cmd.tick_rate);
    for track in tracks {
        session.set_track(track)?;
        if !cmd.no_test {
            session.start_test_run()?;
            driver.run_for(&mut session, 1.0, false);
        }

        session.start_estimation()?;
        driver.run_for(&mut session, cmd.seconds, track.logs_objects());
        session.end_estimation()?;
    }

    let dir = session
        .resident()
        .store()
        .resolve_path(session.resident().user_directory(&cmd.user_id));
    println!("{}", session.resident().status().text());
    println!("files in {}", dir.display());
    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    files.sort();
    for file in files {
        match inspect_file(&file) {
            Ok(status) => println!("\t{}: {}", file.display(), status),
            Err(e) => warn!("{}", e),
        }
    }
    Ok(())
}

/// Feeds the session at a fixed frame rate.
struct Driver {
    frame: Duration,
    tracker: DummyTracker,
    hands: DummyHands,
    started: Instant,
}

impl Driver {
    fn new(tick_rate: f64) -> Self {
        Driver {
            frame: Duration::from_secs_f64(1.0 / tick_rate.max(1.0)),
            tracker: DummyTracker::new(),
            hands: DummyHands::default(),
            started: Instant::now(),
        }
    }

    fn run_for(&mut self, session: &mut Session, secs: f64, move_objects: bool) {
        let run_time = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX);
        let Some(until) = Instant::now().checked_add(run_time) else {
            warn!("cannot run for {}s", secs);
            return;
        };
        let mut failures = 0;
        while Instant::now() < until {
            let frame_start = Instant::now();

            session.update_head(self.tracker.pose_at(self.started.elapsed().as_secs_f64()));
            if move_objects {
                self.hands.step(session.scene_mut());
            }
            if let Err(e) = session.tick() {
                // a failed backup is retried on the next backup period
                failures += 1;
                warn!("tick failed: {}", e);
            }

            if let Some(rest) = self.frame.checked_sub(frame_start.elapsed()) {
                spin_sleep::sleep(rest);
            }
        }
        if failures > 0 {
            warn!("{} ticks failed", failures);
        }
    }
}

fn inspect(cmd: &InspectCommand) -> ExitCode {
    let mut code = ExitCode::SUCCESS;
    for file in &cmd.files {
        match inspect_file(file) {
            Ok(status) => println!("{}: {}", file.display(), status),
            Err(e) => {
                let e = SessionError::from(e);
                eprintln!("{}: {} ({})", file.display(), e, e.kind());
                code = ExitCode::FAILURE;
            }
        }
    }
    code
}
