//! The durable logger: the state of the logging controller while an
//! estimation phase runs.
//!
//! Every stream is kept as an [OpenEnvelope] in memory. Samples are appended
//! at the participant's sampling interval, and every `backup_period` seconds
//! each stream is rendered as a complete document marked `BACKUP` and written
//! to disk. The first backup of a stream creates its file, later ones
//! overwrite it. When the phase ends the same file is overwritten one last
//! time with the `END` marker, so a crash loses at most one backup period.
//!
//! | Stream | Track | Content |
//! |---|---|---|
//! | `HeadData` | both | one [HeadSample] per sampling tick |
//! | `MovingObject` | Locations | the objects held by the participant, per sampling tick |
//! | `StartObject` | Locations | every object when the phase was entered |
//! | `EndObject` | Locations | every object when the phase was left |

use crate::envelope::{EndMarker, OpenEnvelope, Provenance};
use crate::error::SessionError;
use crate::phase::Track;
use crate::records::{HeadSample, ObjectSnapshot};
use crate::session::Resident;
use crate::state_machine::State;
use crate::store::{DataStore, StoreError};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const HEAD_STREAM: &str = "HeadData";
const MOVING_STREAM: &str = "MovingObject";
const START_STREAM: &str = "StartObject";
const END_STREAM: &str = "EndObject";

/// One growing log file.
#[derive(Debug)]
struct LogStream {
    file_name: String,
    /// Set once the file exists on disk.
    saved: bool,
    envelope: OpenEnvelope,
}

impl LogStream {
    fn open(store: &DataStore, directory: &Path, base_name: &str, provenance: &Provenance) -> Self {
        Self {
            file_name: store.unique_name(directory, base_name),
            saved: false,
            envelope: OpenEnvelope::open(provenance),
        }
    }

    fn push<T: Serialize>(&mut self, directory: &Path, entry: &T) -> Result<(), StoreError> {
        self.envelope
            .push(entry)
            .map_err(|source| self.json_error(directory, source))
    }

    /// Write the stream as a `BACKUP` document. `provisional` is added to
    /// the written copy only.
    fn backup(
        &mut self,
        store: &DataStore,
        directory: &Path,
        provisional: Option<&ObjectSnapshot>,
    ) -> Result<(), StoreError> {
        let text = match provisional {
            Some(entry) => self
                .envelope
                .render_with(entry, EndMarker::Backup)
                .map_err(|source| self.json_error(directory, source))?,
            None => self.envelope.render(EndMarker::Backup),
        };

        if self.saved {
            store.overwrite_text(&text, directory, &self.file_name)?;
        } else {
            self.file_name = store.save_text(&text, directory, &self.file_name)?;
            self.saved = true;
        }
        debug!("backed up {} ({} entries)", self.file_name, self.envelope.len());
        Ok(())
    }

    /// Write the stream as a finalized `END` document.
    fn commit(&self, store: &DataStore, directory: &Path) -> Result<(), StoreError> {
        let text = self.envelope.render(EndMarker::End);
        store.overwrite_text(&text, directory, &self.file_name)?;
        info!("committed {} ({} entries)", self.file_name, self.envelope.len());
        Ok(())
    }

    fn json_error(&self, directory: &Path, source: serde_json::Error) -> StoreError {
        StoreError::Json {
            path: directory.join(&self.file_name),
            source,
        }
    }
}

/// The three extra streams of the location track.
#[derive(Debug)]
struct ObjectStreams {
    moving: LogStream,
    start: LogStream,
    end: LogStream,
}

/// Everything belonging to one run of the logger, from `enter()` to
/// `exit()`.
#[derive(Debug)]
struct LogRun {
    user_id: String,
    directory: PathBuf,
    interval: f64,
    started: Duration,
    prev_sample: Option<f64>,
    last_backup: Option<f64>,
    head: LogStream,
    objects: Option<ObjectStreams>,
}

impl LogRun {
    /// Seconds since the run started.
    fn elapsed(&self, now: Duration) -> f64 {
        now.saturating_sub(self.started).as_secs_f64()
    }

    fn sample(&mut self, ctx: &Resident, now: f64) -> Result<(), StoreError> {
        match ctx.head.as_ref().and_then(|pose| HeadSample::at(now, pose)) {
            Some(sample) => self.head.push(&self.directory, &sample)?,
            None => warn!("no valid head pose at {:.3}s, sample skipped", now),
        }

        if let Some(objects) = self.objects.as_mut() {
            let held = ctx.scene.manipulated_snapshot(now);
            if !held.is_empty() {
                objects.moving.push(&self.directory, &held)?;
            }
        }
        Ok(())
    }

    /// Back up every stream. All streams are attempted; the first failure is
    /// returned.
    fn backup(&mut self, ctx: &Resident, now: f64) -> Result<(), StoreError> {
        let store = &ctx.store;
        let directory = &self.directory;
        let mut result = self.head.backup(store, directory, None);

        if let Some(objects) = self.objects.as_mut() {
            let current = ctx.scene.snapshot(now);
            for r in [
                objects.moving.backup(store, directory, None),
                objects.start.backup(store, directory, None),
                objects.end.backup(store, directory, Some(&current)),
            ] {
                result = result.and(r);
            }
        }
        result
    }

    /// Finalize every stream. All streams are attempted; the first failure
    /// is returned.
    fn commit(&self, store: &DataStore) -> Result<(), StoreError> {
        let mut streams = vec![&self.head];
        if let Some(objects) = self.objects.as_ref() {
            streams.extend([&objects.moving, &objects.start, &objects.end]);
        }

        let mut first = None;
        for stream in streams {
            if let Err(e) = stream.commit(store, &self.directory) {
                error!("could not commit {}: {}", stream.file_name, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

///
/// The logging controller's state for one estimation track. A new logger is
/// created for every estimation phase; all of its data lives between
/// `enter()` and `exit()`.
///
#[derive(Debug)]
pub struct DurableLogger {
    track: Track,
    run: Option<LogRun>,
}

impl DurableLogger {
    /// A logger for `track` that has not started yet.
    pub fn new(track: Track) -> Self {
        Self { track, run: None }
    }

    /// Like [DurableLogger::new], ready to hand to a controller.
    pub fn boxed(track: Track) -> Box<Self> {
        Box::new(Self::new(track))
    }

    /// The track being logged.
    pub fn track(&self) -> Track {
        self.track
    }

    /// Head samples taken so far.
    pub fn head_samples(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.head.envelope.len())
    }

    /// The name of the head stream file, without the file ending.
    pub fn head_file(&self) -> Option<&str> {
        self.run.as_ref().map(|run| run.head.file_name.as_str())
    }

    /// Open the streams of a new run for the current set.
    fn start(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        let set = ctx
            .current_set
            .as_ref()
            .filter(|set| set.is_valid())
            .ok_or_else(|| {
                SessionError::InvalidDataState("no valid current set to log for".to_owned())
            })?;
        let user_id = set.user_id().to_owned();

        let mut interval = set.profile.sampling_interval;
        if !(interval.is_finite() && interval > 0.0) {
            warn!(
                "user {} has sampling interval {}, using {}",
                user_id, interval, ctx.settings.default_sampling_interval
            );
            interval = ctx.settings.default_sampling_interval;
        }

        let directory = ctx.user_directory(&user_id);
        ctx.store.ensure_directory(&directory)?;

        let provenance = Provenance::user(&user_id);
        let name = |stream: &str| format!("{}{}{}", stream, self.track, user_id);
        let head = LogStream::open(&ctx.store, &directory, &name(HEAD_STREAM), &provenance);

        let objects = if self.track.logs_objects() {
            let mut streams = ObjectStreams {
                moving: LogStream::open(&ctx.store, &directory, &name(MOVING_STREAM), &provenance),
                start: LogStream::open(&ctx.store, &directory, &name(START_STREAM), &provenance),
                end: LogStream::open(&ctx.store, &directory, &name(END_STREAM), &provenance),
            };
            streams.start.push(&directory, &ctx.scene.snapshot(0.0))?;
            Some(streams)
        } else {
            None
        };

        ctx.status.show(format!(
            "Logging {} for user {} every {}s",
            self.track, user_id, interval
        ));
        self.run = Some(LogRun {
            user_id,
            directory,
            interval,
            started: ctx.clock.now(),
            prev_sample: None,
            last_backup: None,
            head,
            objects,
        });
        Ok(())
    }
}

impl fmt::Display for DurableLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Logging({})", self.track)
    }
}

impl State for DurableLogger {
    type Context = Resident;
    type Error = SessionError;

    fn enter(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        let started = self.start(ctx);
        if let Err(e) = &started {
            ctx.status
                .alert(format!("could not start logging {}: {}", self.track, e));
        }
        started
    }

    fn execute(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        let now = run.elapsed(ctx.clock.now());

        if run.prev_sample.map_or(true, |prev| now - prev >= run.interval) {
            run.sample(ctx, now)?;
            run.prev_sample = Some(now);
        }

        let period = ctx.settings.backup_period;
        if run.last_backup.map_or(true, |last| now - last >= period) {
            run.last_backup = Some(now);
            if let Err(e) = run.backup(ctx, now) {
                ctx.status
                    .alert(format!("backup failed, retrying in {}s: {}", period, e));
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn exit(&mut self, ctx: &mut Resident) -> Result<(), SessionError> {
        let Some(mut run) = self.run.take() else {
            return Ok(());
        };
        let now = run.elapsed(ctx.clock.now());

        if let Some(objects) = run.objects.as_mut() {
            objects.end.push(&run.directory, &ctx.scene.snapshot(now))?;
        }

        if let Err(e) = run.commit(&ctx.store) {
            ctx.status.alert(format!(
                "could not save the data of user {}: {}",
                run.user_id, e
            ));
            return Err(e.into());
        }

        if let Err(e) = ctx.record_completion(&run.user_id, self.track) {
            ctx.status.alert(format!(
                "data of user {} saved, but the index was not updated: {}",
                run.user_id, e
            ));
            return Err(e);
        }
        ctx.status.show(format!(
            "Saved {} data of user {} ({} samples)",
            self.track,
            run.user_id,
            run.head.envelope.len()
        ));
        Ok(())
    }
}
