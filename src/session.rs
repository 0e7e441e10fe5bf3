//! The top-level session context. A [Session] owns the phase controller,
//! the logging controller and the [Resident] data both of them work on.
//! There is no global state: the host application keeps the session and
//! calls into it from its button handlers and from its frame loop.

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::envelope::Provenance;
use crate::error::SessionError;
use crate::index::{Advance, ApplicationIndex, UserList};
use crate::logger::DurableLogger;
use crate::phase::{Phase, PhaseState, Stage, Submanager, Track};
use crate::records::{HeadPose, SessionRecord};
use crate::roster::{LoadSettings, Roster};
use crate::scene::Scene;
use crate::state_machine::StateMachine;
use crate::status::StatusBoard;
use crate::store::{DataStore, LoadOrigin};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

///
/// Everything the states of both controllers read and write. Only the
/// session hands out `&mut Resident`, and only to one state at a time.
///
pub struct Resident {
    pub(crate) settings: Settings,
    pub(crate) store: DataStore,
    pub(crate) index: ApplicationIndex,
    pub(crate) roster: Roster,
    /// The user being run. Only ever replaced as a whole.
    pub(crate) current_set: Option<SessionRecord>,
    pub(crate) scene: Scene,
    pub(crate) head: Option<HeadPose>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) submanagers: Vec<Box<dyn Submanager>>,
    pub(crate) status: StatusBoard,
}

impl Resident {
    /// Resident data with an empty index. Nothing is read or written.
    pub fn new(settings: Settings, store: DataStore, clock: Box<dyn Clock>) -> Self {
        let index = ApplicationIndex::fresh(settings.user_data_folder.as_str());
        Self {
            settings,
            store,
            index,
            roster: Roster::default(),
            current_set: None,
            scene: Scene::new(),
            head: None,
            clock,
            submanagers: Vec::new(),
            status: StatusBoard::new(),
        }
    }

    /// The settings the session was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The durable store.
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// The application index as last persisted.
    pub fn index(&self) -> &ApplicationIndex {
        &self.index
    }

    /// The users loaded when the settings menu was last entered.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The user being run.
    pub fn current_set(&self) -> Option<&SessionRecord> {
        self.current_set.as_ref()
    }

    /// The live scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// What the operator has been told.
    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Logical folder holding one folder per user.
    pub fn data_directory(&self) -> PathBuf {
        Path::new(&self.settings.main_folder).join(self.index.user_data_folder())
    }

    /// Logical folder holding the files of one user.
    pub fn user_directory(&self, user_id: &str) -> PathBuf {
        self.data_directory()
            .join(ApplicationIndex::user_folder(user_id))
    }

    /// Overwrite the index on disk and tell the collaborators.
    pub(crate) fn persist_index(&mut self) -> Result<(), SessionError> {
        self.store.overwrite(
            &self.index,
            &Provenance::Index,
            &self.settings.main_folder,
            &self.settings.index_name,
        )?;
        debug!("index saved");
        for s in self.submanagers.iter_mut() {
            s.on_index_updated(&self.index);
        }
        Ok(())
    }

    /// Move a user's token forward after they finished `track`, and persist
    /// the index if it changed.
    pub(crate) fn record_completion(
        &mut self,
        user_id: &str,
        track: Track,
    ) -> Result<Advance, SessionError> {
        let token = ApplicationIndex::user_token(user_id);
        let advance = self.index.advance(&token, track.completes_to())?;
        match advance {
            Advance::Moved { .. } => self.persist_index()?,
            Advance::Unchanged(list) => info!("{} stays in the {} users", token, list),
        }
        Ok(advance)
    }

    pub(crate) fn notify_entered(&mut self, phase: Phase) {
        let mut stage = Stage {
            scene: &mut self.scene,
            current_set: self.current_set.as_ref(),
        };
        for s in self.submanagers.iter_mut() {
            s.on_phase_entered(phase, &mut stage);
        }
    }

    pub(crate) fn notify_left(&mut self, phase: Phase) {
        let mut stage = Stage {
            scene: &mut self.scene,
            current_set: self.current_set.as_ref(),
        };
        for s in self.submanagers.iter_mut() {
            s.on_phase_left(phase, &mut stage);
        }
    }
}

/// What the user button does when it is clicked next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ButtonAction {
    StartTestRun,
    StartEstimation,
    EndEstimation,
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonAction::StartTestRun => write!(f, "Start test run"),
            ButtonAction::StartEstimation => write!(f, "Start"),
            ButtonAction::EndEstimation => write!(f, "Done"),
        }
    }
}

/// Sets up a [Session]. Only the store root is required.
pub struct SessionBuilder {
    root: PathBuf,
    bundled: Option<PathBuf>,
    settings: Settings,
    clock: Box<dyn Clock>,
    submanagers: Vec<Box<dyn Submanager>>,
}

impl SessionBuilder {
    fn new(root: PathBuf) -> Self {
        SessionBuilder {
            root,
            bundled: None,
            settings: Settings::default(),
            clock: Box::new(SystemClock::default()),
            submanagers: Vec::new(),
        }
    }

    /// Read-only folder with files to fall back on when the store lacks them.
    pub fn set_bundled(self, dir: impl Into<PathBuf>) -> Self {
        SessionBuilder {
            bundled: Some(dir.into()),
            ..self
        }
    }

    /// Use `settings` instead of the defaults. They are checked in
    /// [SessionBuilder::build].
    pub fn set_settings(self, settings: Settings) -> Self {
        SessionBuilder { settings, ..self }
    }

    /// Use `clock` instead of the system clock.
    pub fn set_clock(self, clock: Box<dyn Clock>) -> Self {
        SessionBuilder { clock, ..self }
    }

    /// Register a collaborator. They are notified in registration order.
    pub fn add_submanager(mut self, submanager: Box<dyn Submanager>) -> Self {
        self.submanagers.push(submanager);
        self
    }

    /// Load (or create) the index and bring the session to the settings
    /// menu.
    pub fn build(self) -> Result<Session, SessionError> {
        self.settings
            .validate()
            .map_err(|e| SessionError::InvalidArgument(e.to_string()))?;
        let mut store = DataStore::new(self.root);
        if let Some(bundled) = self.bundled {
            store = store.with_bundled(bundled);
        }

        let mut resident = Resident::new(self.settings, store, self.clock);
        resident.submanagers = self.submanagers;

        let loaded = resident
            .store
            .secure_load::<ApplicationIndex>(resident.settings.index_path())?;
        match loaded.origin {
            LoadOrigin::Default => {
                warn!("no index found, starting a new one");
                resident.persist_index()?;
            }
            _ if loaded.value.is_valid() => resident.index = loaded.value,
            _ => {
                return Err(SessionError::InvalidDataState(
                    "the application index is not valid".to_owned(),
                ))
            }
        }

        let mut session = Session {
            phases: StateMachine::new(),
            logging: StateMachine::new(),
            resident,
            phase: None,
            track: None,
            button: None,
            button_ready_at: Duration::ZERO,
        };
        session.reset_to_default()?;
        Ok(session)
    }
}

///
/// One running experiment installation. Phase changes are requested through
/// the public operations; [Session::tick] has to be called once per frame.
///
/// Every operation that is not allowed in the current phase fails with
/// [SessionError::InvalidPhaseArgument] and changes nothing.
///
pub struct Session {
    phases: StateMachine<Resident, SessionError>,
    logging: StateMachine<Resident, SessionError>,
    resident: Resident,
    phase: Option<Phase>,
    track: Option<Track>,
    button: Option<ButtonAction>,
    button_ready_at: Duration,
}

impl Session {
    /// Make a [SessionBuilder] for a store rooted at `root`.
    pub fn builder(root: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder::new(root.into())
    }

    /// Run both controllers once.
    pub fn tick(&mut self) -> Result<(), SessionError> {
        self.phases.tick(&mut self.resident)?;
        self.logging.tick(&mut self.resident)
    }

    /// Feed the latest pose from the head tracker.
    pub fn update_head(&mut self, pose: HeadPose) {
        self.resident.head = Some(pose);
    }

    /// The current phase. `None` only while a reset failed half way.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// The selected track.
    pub fn track(&self) -> Option<Track> {
        self.track
    }

    /// What the user button would do now, if it is armed.
    pub fn button(&self) -> Option<ButtonAction> {
        self.button
    }

    /// Name of the logging controller's state.
    pub fn logging_state(&self) -> Option<String> {
        self.logging.current_name()
    }

    /// An estimation phase is running.
    pub fn is_logging(&self) -> bool {
        self.phase.and_then(|p| p.logged_track()).is_some()
    }

    /// Read access to everything the states work on.
    pub fn resident(&self) -> &Resident {
        &self.resident
    }

    /// The live scene, for collaborators that move objects between ticks.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.resident.scene
    }

    /// Stop logging, forget the current user and start over at the settings
    /// menu. Errors from stopping the logger are returned after the reset
    /// has finished.
    pub fn reset_to_default(&mut self) -> Result<(), SessionError> {
        let stopped = self.logging.to_idle(&mut self.resident);
        let left = self.phases.to_idle(&mut self.resident);
        self.phase = None;

        for s in self.resident.submanagers.iter_mut() {
            s.reset();
        }
        self.button = None;
        self.track = None;
        self.resident.current_set = None;
        self.resident.scene.clear();

        self.enter(Phase::Initialization)?;
        self.enter(Phase::SettingsMenu)?;
        stopped.and(left)
    }

    /// Start over for the next participant.
    pub fn new_user(&mut self) -> Result<(), SessionError> {
        info!("new user");
        self.reset_to_default()
    }

    /// Register a new user: save their profile and start layout, list them
    /// as a new user and make them the current set.
    pub fn set_and_save_new_settings(&mut self, record: SessionRecord) -> Result<(), SessionError> {
        self.require_not_logging("save new settings")?;
        if !record.is_replayable() {
            return Err(self.invalid_data(format!(
                "settings for user {:?} are incomplete",
                record.user_id()
            )));
        }

        let user_id = record.user_id().to_owned();
        let token = ApplicationIndex::user_token(&user_id);
        if self.resident.index.position(&token).is_some() {
            return Err(self.invalid_data(format!("user {} already exists", user_id)));
        }

        let r = &mut self.resident;
        let directory = r.user_directory(&user_id);
        let provenance = Provenance::user(&user_id);
        let start_name = format!("{}{}", r.settings.start_data_name, user_id);
        r.store
            .overwrite(&record.snapshot, &provenance, &directory, &start_name)?;
        r.store
            .overwrite(&record.profile, &provenance, &directory, &format!("user{}", user_id))?;

        r.index.register(token);
        r.persist_index()?;
        r.roster.push(UserList::New, record.clone());
        r.status.show(format!("Saved settings of user {}", user_id));
        r.current_set = Some(record);
        Ok(())
    }

    /// Make the user at `position` of `list` the current set.
    pub fn select_user(&mut self, list: UserList, position: usize) -> Result<(), SessionError> {
        self.require_not_logging("select a user")?;
        let record = self
            .resident
            .roster
            .list(list)
            .get(position)
            .cloned()
            .ok_or_else(|| {
                SessionError::InvalidArgument(format!("no user at {} of the {} list", position, list))
            })?;
        self.choose(record);
        Ok(())
    }

    /// Make the user with `user_id` the current set.
    pub fn select_user_by_id(&mut self, user_id: &str) -> Result<(), SessionError> {
        self.require_not_logging("select a user")?;
        let record = self
            .resident
            .roster
            .find(user_id)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| SessionError::InvalidArgument(format!("unknown user {}", user_id)))?;
        self.choose(record);
        Ok(())
    }

    /// Choose the track to run, which arms the user button.
    pub fn set_track(&mut self, track: Track) -> Result<(), SessionError> {
        self.require_not_logging("change the track")?;
        self.track = Some(track);
        self.resident.status.show(format!("Track: {}", track));
        self.arm_user_button(ButtonAction::StartTestRun);
        Ok(())
    }

    /// [Session::set_track] by the track's name.
    pub fn set_track_by_name(&mut self, name: &str) -> Result<(), SessionError> {
        let track = name.parse()?;
        self.set_track(track)
    }

    /// Set what the next click of the user button does.
    pub fn arm_user_button(&mut self, action: ButtonAction) {
        debug!("user button: {}", action);
        self.button = Some(action);
    }

    /// Run whatever the button is armed with. Clicks while the button is
    /// unarmed or cooling down are ignored and return `None`.
    pub fn user_button_clicked(&mut self) -> Result<Option<ButtonAction>, SessionError> {
        let now = self.resident.clock.now();
        if now < self.button_ready_at {
            debug!("user button is cooling down");
            return Ok(None);
        }
        let Some(action) = self.button else {
            return Ok(None);
        };

        match action {
            ButtonAction::StartTestRun => self.start_test_run()?,
            ButtonAction::StartEstimation => self.start_estimation()?,
            ButtonAction::EndEstimation => self.end_estimation()?,
        }
        let cooldown = Duration::try_from_secs_f64(self.resident.settings.button_cooldown)
            .unwrap_or(Duration::MAX);
        self.button_ready_at = now.saturating_add(cooldown);
        Ok(Some(action))
    }

    /// Enter the practice phase of the selected track.
    pub fn start_test_run(&mut self) -> Result<(), SessionError> {
        let track = self.require_track()?;
        self.require_current_set()?;
        self.require_track_open(track)?;
        self.change_phase(Phase::Test(track))?;
        self.arm_user_button(ButtonAction::StartEstimation);
        Ok(())
    }

    /// Enter the estimation phase of the selected track, which starts the
    /// logger.
    pub fn start_estimation(&mut self) -> Result<(), SessionError> {
        let track = self.require_track()?;
        self.require_current_set()?;
        self.require_track_open(track)?;
        self.change_phase(Phase::Estimation(track))?;
        self.arm_user_button(ButtonAction::EndEstimation);
        Ok(())
    }

    /// Leave the estimation phase the normal way: the price track pauses,
    /// the location track ends.
    pub fn end_estimation(&mut self) -> Result<(), SessionError> {
        let Some(track) = self.phase.and_then(|p| p.logged_track()) else {
            return Err(self.not_now("end the estimation"));
        };
        self.change_phase(track.finish())?;
        self.button = None;
        Ok(())
    }

    /// Leave the estimation phase for a pause, whatever the track.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.change_phase(Phase::Pause)?;
        self.button = None;
        Ok(())
    }

    /// Go from a pause or the end back to the settings menu, keeping the
    /// current user.
    pub fn back_to_menu(&mut self) -> Result<(), SessionError> {
        self.change_phase(Phase::SettingsMenu)?;
        self.track = None;
        self.button = None;
        Ok(())
    }

    fn change_phase(&mut self, next: Phase) -> Result<(), SessionError> {
        if !next.can_follow(self.phase) {
            let from = self.phase.map_or("nothing".to_owned(), |p| p.to_string());
            return Err(self.not_now(&format!("go from {} to {}", from, next)));
        }

        // the final commit has to see the scene of the phase being left
        if self.is_logging() {
            self.logging.to_idle(&mut self.resident)?;
        }
        self.enter(next)
    }

    /// Switch the phase controller to `next` without checking the order,
    /// then start whatever the logging controller runs in that phase.
    fn enter(&mut self, next: Phase) -> Result<(), SessionError> {
        let previous = self.phase;
        if let Err(e) = self
            .phases
            .change_state(PhaseState::boxed(next), &mut self.resident)
        {
            self.phase = None;
            return Err(e);
        }
        self.phase = Some(next);

        match next {
            Phase::Estimation(track) => {
                let started = self
                    .logging
                    .change_state(DurableLogger::boxed(track), &mut self.resident);
                if let (Err(_), Some(previous)) = (&started, previous) {
                    // no estimation without a running logger
                    warn!("logger did not start, going back to {}", previous);
                    if let Err(e) = self.enter(previous) {
                        error!("could not go back to {}: {}", previous, e);
                    }
                }
                started
            }
            Phase::SettingsMenu => self
                .logging
                .change_state(LoadSettings::boxed(), &mut self.resident),
            Phase::Initialization | Phase::Test(_) | Phase::Pause | Phase::End => Ok(()),
        }
    }

    fn choose(&mut self, record: SessionRecord) {
        self.resident
            .status
            .show(format!("Selected user {}", record.user_id()));
        self.resident.current_set = Some(record);
    }

    fn require_not_logging(&mut self, what: &str) -> Result<(), SessionError> {
        if self.is_logging() {
            return Err(self.not_now(what));
        }
        Ok(())
    }

    fn require_track(&mut self) -> Result<Track, SessionError> {
        match self.track {
            Some(track) => Ok(track),
            None => Err(self.not_now("start without a track")),
        }
    }

    fn require_current_set(&mut self) -> Result<(), SessionError> {
        match self.resident.current_set.as_ref() {
            Some(set) if set.is_valid() => Ok(()),
            _ => Err(self.invalid_data("no user selected".to_owned())),
        }
    }

    /// The current user has to have finished the tracks before `track`.
    fn require_track_open(&mut self, track: Track) -> Result<(), SessionError> {
        let Some(user_id) = self.resident.current_set().map(|s| s.user_id().to_owned()) else {
            return Err(self.invalid_data("no user selected".to_owned()));
        };
        match self.resident.index.position(&ApplicationIndex::user_token(&user_id)) {
            Some(list) if list >= track.opens_at() => Ok(()),
            Some(list) => Err(self.invalid_data(format!(
                "user {} is in the {} users and cannot run the {} track yet",
                user_id, list, track
            ))),
            None => Err(self.invalid_data(format!("user {} is not in the index", user_id))),
        }
    }

    fn not_now(&mut self, what: &str) -> SessionError {
        let phase = self.phase.map_or("no phase".to_owned(), |p| p.to_string());
        let msg = format!("cannot {} in {}", what, phase);
        self.resident.status.alert(msg.clone());
        SessionError::InvalidPhaseArgument(msg)
    }

    fn invalid_data(&mut self, msg: String) -> SessionError {
        self.resident.status.alert(msg.clone());
        SessionError::InvalidDataState(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::records::{ObjectPose, ObjectSnapshot, Quat, UserGroup, UserProfile, Vec3};
    use crate::store::inspect_file;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    /// Writes down every notification it gets, and lays out the current
    /// set's objects whenever a track phase starts.
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl Submanager for Recorder {
        fn on_phase_entered(&mut self, phase: Phase, stage: &mut Stage<'_>) {
            self.events.borrow_mut().push(format!("entered {}", phase));
            match phase {
                Phase::Test(_) | Phase::Estimation(_) => {
                    if let Some(set) = stage.current_set {
                        stage.scene.populate(&set.snapshot);
                    }
                }
                Phase::Initialization | Phase::SettingsMenu | Phase::Pause | Phase::End => {}
            }
        }

        fn on_phase_left(&mut self, phase: Phase, _stage: &mut Stage<'_>) {
            self.events.borrow_mut().push(format!("left {}", phase));
        }

        fn on_index_updated(&mut self, _index: &ApplicationIndex) {
            self.events.borrow_mut().push("index".to_owned());
        }

        fn reset(&mut self) {
            self.events.borrow_mut().push("reset".to_owned());
        }
    }

    struct Fixture {
        tmp: tempfile::TempDir,
        clock: ManualClock,
        events: Rc<RefCell<Vec<String>>>,
        session: Session,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let session = Session::builder(tmp.path())
            .set_clock(Box::new(clock.clone()))
            .add_submanager(Box::new(Recorder {
                events: events.clone(),
            }))
            .build()
            .unwrap();
        Fixture {
            tmp,
            clock,
            events,
            session,
        }
    }

    fn record(id: &str) -> SessionRecord {
        SessionRecord::new(
            UserProfile::new(id, UserGroup::GroupB, 1.0),
            ObjectSnapshot::new(
                0.0,
                Vec3::ZERO,
                vec![
                    ObjectPose::new("Apple", Vec3::new(0.5, 0.0, 0.0), Quat::IDENTITY),
                    ObjectPose::new("Lemon", Vec3::new(-0.5, 0.0, 0.0), Quat::IDENTITY),
                ],
            ),
        )
    }

    fn head() -> HeadPose {
        HeadPose {
            camera_position: Vec3::new(0.0, 1.5, 0.0),
            camera_rotation: Quat::IDENTITY,
            gaze_origin: Vec3::new(0.0, 1.5, 0.0),
            gaze_direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    fn run_for(fx: &mut Fixture, secs: f64) {
        let start = fx.clock.now().as_secs_f64();
        let mut t = 0.0;
        while t <= secs {
            fx.clock.set_secs(start + t);
            fx.session.tick().unwrap();
            t += 0.5;
        }
    }

    /// Names of the files in the user's folder that start with `prefix`.
    fn files(fx: &Fixture, user_id: &str, prefix: &str) -> Vec<PathBuf> {
        let r = fx.session.resident();
        let dir = r.store().resolve_path(r.user_directory(user_id));
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map_or(false, |n| n.to_string_lossy().starts_with(prefix))
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn build_creates_an_index_and_opens_the_menu() {
        let fx = fixture();
        assert_eq!(fx.session.phase(), Some(Phase::SettingsMenu));
        assert_eq!(fx.session.logging_state().as_deref(), Some("LoadSettings"));
        assert!(fx
            .tmp
            .path()
            .join("DataFiles")
            .join("generalSettings.json")
            .exists());
    }

    #[test]
    fn full_participant_run() {
        let mut fx = fixture();
        let token = ApplicationIndex::user_token("5");
        fx.session.update_head(head());
        fx.session.set_and_save_new_settings(record("5")).unwrap();
        assert_eq!(fx.session.resident().index().position(&token), Some(UserList::New));

        // price track
        fx.session.set_track(Track::Prices).unwrap();
        fx.session.start_test_run().unwrap();
        fx.session.start_estimation().unwrap();
        assert!(fx.session.is_logging());
        run_for(&mut fx, 3.0);
        fx.session.end_estimation().unwrap();
        assert_eq!(fx.session.phase(), Some(Phase::Pause));
        assert_eq!(
            fx.session.resident().index().position(&token),
            Some(UserList::Incomplete)
        );

        // next cycle: same user, location track
        fx.session.new_user().unwrap();
        assert!(fx.session.resident().current_set().is_none());
        fx.session.select_user_by_id("5").unwrap();
        fx.session.set_track_by_name("Locations").unwrap();
        fx.session.start_estimation().unwrap();
        run_for(&mut fx, 3.0);
        fx.session.pause().unwrap();
        assert_eq!(fx.session.logging_state(), None);

        for prefix in [
            "HeadDataLocations5",
            "MovingObjectLocations5",
            "StartObjectLocations5",
            "EndObjectLocations5",
        ] {
            let found = files(&fx, "5", prefix);
            assert_eq!(found.len(), 1, "{}", prefix);
            assert!(inspect_file(&found[0]).unwrap().is_finalized());
        }
        let start = inspect_file(&files(&fx, "5", "StartObjectLocations5")[0]).unwrap();
        assert_eq!(start.entries, 1);
        assert_eq!(
            fx.session.resident().index().position(&token),
            Some(UserList::Complete)
        );
    }

    #[test]
    fn logger_stops_before_the_next_phase_starts() {
        let mut fx = fixture();
        fx.session.update_head(head());
        fx.session.set_and_save_new_settings(record("8")).unwrap();
        fx.session.set_track(Track::Prices).unwrap();
        fx.session.start_estimation().unwrap();
        run_for(&mut fx, 1.0);
        fx.events.borrow_mut().clear();

        fx.session.pause().unwrap();
        assert_eq!(
            *fx.events.borrow(),
            vec!["index", "left PricesEstimation", "entered Pause"]
        );
    }

    #[test]
    fn user_button_walks_through_the_track() {
        let mut fx = fixture();
        fx.session.update_head(head());
        fx.session.set_and_save_new_settings(record("3")).unwrap();
        assert_eq!(fx.session.user_button_clicked().unwrap(), None);

        fx.session.set_track(Track::Prices).unwrap();
        assert_eq!(
            fx.session.user_button_clicked().unwrap(),
            Some(ButtonAction::StartTestRun)
        );
        assert_eq!(fx.session.phase(), Some(Phase::Test(Track::Prices)));

        fx.clock.set_secs(5.0);
        assert_eq!(fx.session.user_button_clicked().unwrap(), None);
        assert_eq!(fx.session.phase(), Some(Phase::Test(Track::Prices)));

        fx.clock.set_secs(10.0);
        assert_eq!(
            fx.session.user_button_clicked().unwrap(),
            Some(ButtonAction::StartEstimation)
        );
        fx.session.tick().unwrap();

        fx.clock.set_secs(20.0);
        assert_eq!(
            fx.session.user_button_clicked().unwrap(),
            Some(ButtonAction::EndEstimation)
        );
        assert_eq!(fx.session.phase(), Some(Phase::Pause));
        assert_eq!(fx.session.button(), None);
    }

    #[test]
    fn operations_out_of_order_are_rejected() {
        let mut fx = fixture();
        let kind = |r: Result<(), SessionError>| r.unwrap_err().kind();

        assert_eq!(kind(fx.session.start_estimation()), ErrorKind::InvalidPhaseArgument);
        assert_eq!(kind(fx.session.pause()), ErrorKind::InvalidPhaseArgument);
        assert_eq!(kind(fx.session.end_estimation()), ErrorKind::InvalidPhaseArgument);
        assert_eq!(
            kind(fx.session.set_track_by_name("Colors")),
            ErrorKind::InvalidPhaseArgument
        );

        fx.session.set_track(Track::Locations).unwrap();
        assert_eq!(kind(fx.session.start_estimation()), ErrorKind::InvalidDataState);
        assert_eq!(fx.session.phase(), Some(Phase::SettingsMenu));
        assert!(fx.session.resident().status().error_count() >= 4);
    }

    #[test]
    fn location_track_waits_for_the_price_track() {
        let mut fx = fixture();
        let token = ApplicationIndex::user_token("7");
        fx.session.update_head(head());
        fx.session.set_and_save_new_settings(record("7")).unwrap();
        fx.session.set_track(Track::Locations).unwrap();

        let errors = fx.session.resident().status().error_count();
        let err = fx.session.start_test_run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataState);
        let err = fx.session.start_estimation().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataState);
        assert_eq!(fx.session.resident().status().error_count(), errors + 2);
        assert_eq!(fx.session.phase(), Some(Phase::SettingsMenu));
        assert_eq!(fx.session.resident().index().position(&token), Some(UserList::New));

        fx.session.set_track(Track::Prices).unwrap();
        fx.session.start_estimation().unwrap();
        fx.session.end_estimation().unwrap();
        fx.session.back_to_menu().unwrap();
        fx.session.set_track(Track::Locations).unwrap();
        fx.session.start_estimation().unwrap();
        fx.session.end_estimation().unwrap();
        assert_eq!(
            fx.session.resident().index().position(&token),
            Some(UserList::Complete)
        );
    }

    #[test]
    fn estimation_is_undone_when_logging_cannot_start() {
        let mut fx = fixture();
        fx.session.update_head(head());
        fx.session.set_and_save_new_settings(record("6")).unwrap();
        fx.session.set_track(Track::Prices).unwrap();

        // a plain file where the user folder should be
        let r = fx.session.resident();
        let dir = r.store().resolve_path(r.user_directory("6"));
        fs::remove_dir_all(&dir).unwrap();
        fs::write(&dir, b"in the way").unwrap();

        let errors = fx.session.resident().status().error_count();
        let err = fx.session.start_estimation().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(fx.session.phase(), Some(Phase::SettingsMenu));
        assert!(!fx.session.is_logging());
        assert_eq!(fx.session.logging_state().as_deref(), Some("LoadSettings"));
        assert!(fx.session.resident().status().error_count() > errors);

        assert!(fx.session.end_estimation().is_err());
        assert_eq!(fx.session.phase(), Some(Phase::SettingsMenu));
        assert_eq!(
            fx.session.resident().index().position(&ApplicationIndex::user_token("6")),
            Some(UserList::New)
        );
    }

    #[test]
    fn test_run_is_restored_when_logging_cannot_start() {
        let mut fx = fixture();
        fx.session.set_and_save_new_settings(record("9")).unwrap();
        fx.session.set_track(Track::Prices).unwrap();
        fx.session.start_test_run().unwrap();

        let r = fx.session.resident();
        let dir = r.store().resolve_path(r.user_directory("9"));
        fs::remove_dir_all(&dir).unwrap();
        fs::write(&dir, b"in the way").unwrap();

        assert!(fx.session.start_estimation().is_err());
        assert_eq!(fx.session.phase(), Some(Phase::Test(Track::Prices)));
        assert_eq!(fx.session.logging_state(), None);
        assert_eq!(fx.session.button(), Some(ButtonAction::StartEstimation));
    }

    #[test]
    fn unusable_settings_are_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Session::builder(tmp.path())
            .set_settings(Settings {
                button_cooldown: f64::INFINITY,
                ..Settings::default()
            })
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn long_cooldown_keeps_the_button_blocked() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let mut session = Session::builder(tmp.path())
            .set_clock(Box::new(clock.clone()))
            .set_settings(Settings {
                button_cooldown: 1e300,
                ..Settings::default()
            })
            .build()
            .unwrap();
        session.set_and_save_new_settings(record("2")).unwrap();
        session.set_track(Track::Prices).unwrap();

        assert_eq!(
            session.user_button_clicked().unwrap(),
            Some(ButtonAction::StartTestRun)
        );
        clock.set_secs(1e9);
        assert_eq!(session.user_button_clicked().unwrap(), None);
    }

    #[test]
    fn no_user_changes_while_logging() {
        let mut fx = fixture();
        fx.session.set_and_save_new_settings(record("1")).unwrap();
        fx.session.set_track(Track::Prices).unwrap();
        fx.session.start_estimation().unwrap();

        assert!(fx.session.set_and_save_new_settings(record("2")).is_err());
        assert!(fx.session.select_user_by_id("1").is_err());
        assert!(fx.session.set_track(Track::Locations).is_err());
        assert_eq!(fx.session.resident().current_set().unwrap().user_id(), "1");
    }

    #[test]
    fn new_settings_are_checked() {
        let mut fx = fixture();
        let mut empty = record("4");
        empty.snapshot = ObjectSnapshot::new(0.0, Vec3::ZERO, vec![]);
        let err = fx.session.set_and_save_new_settings(empty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataState);

        fx.session.set_and_save_new_settings(record("4")).unwrap();
        let err = fx.session.set_and_save_new_settings(record("4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDataState);
        assert_eq!(fx.session.resident().index().list(UserList::New).len(), 1);
    }

    #[test]
    fn restart_picks_up_saved_users() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::builder(tmp.path()).build().unwrap();
        session.set_and_save_new_settings(record("21")).unwrap();
        session.set_and_save_new_settings(record("22")).unwrap();
        drop(session);

        let mut session = Session::builder(tmp.path()).build().unwrap();
        assert_eq!(session.resident().roster().list(UserList::New).len(), 2);
        session.select_user(UserList::New, 1).unwrap();
        assert_eq!(session.resident().current_set().unwrap().user_id(), "22");

        let err = session.select_user(UserList::Complete, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn bundled_index_is_copied_into_the_store() {
        let bundled = tempfile::tempdir().unwrap();
        let mut index = ApplicationIndex::fresh("participants");
        index.register(ApplicationIndex::user_token("77"));
        DataStore::new(bundled.path())
            .overwrite(&index, &Provenance::Index, "DataFiles", "generalSettings")
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let session = Session::builder(tmp.path())
            .set_bundled(bundled.path())
            .build()
            .unwrap();
        assert_eq!(session.resident().index(), &index);
        assert_eq!(
            session.resident().data_directory(),
            Path::new("DataFiles").join("participants")
        );
        // user 77 has no files anywhere
        assert!(session.resident().roster().is_empty());
        assert!(tmp
            .path()
            .join("DataFiles")
            .join("generalSettings.json")
            .exists());
    }

    #[test]
    fn reset_notifies_collaborators() {
        let mut fx = fixture();
        fx.events.borrow_mut().clear();
        fx.session.reset_to_default().unwrap();
        assert_eq!(
            *fx.events.borrow(),
            vec![
                "left SettingsMenu",
                "reset",
                "entered Initialization",
                "left Initialization",
                "entered SettingsMenu"
            ]
        );
    }
}
