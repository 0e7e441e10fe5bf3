//! Interactive operator dashboard. Keys stand in for the headset's buttons
//! and menus; head and hand data come from the dummy tracker.

mod gui;

use clap::Parser;
use log::error;
use studyscribe::{
    args::MonitorArgs,
    dummy_tracker::TableSetter,
    gui::{user_selector, MonitorError},
    session::Session,
};

fn main() {
    env_logger::init();
    if let Err(e) = run(MonitorArgs::parse()) {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: MonitorArgs) -> Result<(), MonitorError> {
    let settings = args.store.settings()?;
    let mut builder = Session::builder(args.store.root.clone())
        .set_settings(settings)
        .add_submanager(Box::new(TableSetter::default()));
    if let Some(bundled) = &args.store.bundled {
        builder = builder.set_bundled(bundled.clone());
    }
    let mut session = builder.build()?;

    if let Some(user_id) = user_selector(session.resident().roster())? {
        session.select_user_by_id(&user_id)?;
    }

    gui::engage_gui(session, args.tick_rate)
}
