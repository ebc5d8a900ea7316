// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Automatic note silencing.
//!
//! The silencer tracks every sounding note by (channel, number) and runs a single
//! sweep thread that turns notes off once they expire. A new note for a key that
//! is already sounding replaces the old entry, so the key is only turned off once.

use std::{
    collections::HashMap,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, select, tick, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use crate::midi::{self, Note, NoteKey, Output};

/// How often the sweep runs unless configured otherwise.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// How long stop waits for the final silence pass before giving up on the sweep thread.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("silencer is not running")]
    NotRunning,

    #[error("silencer is already running")]
    AlreadyRunning,

    #[error("sweep period must be greater than zero")]
    ZeroPeriod,

    #[error("error silencing note {number} on channel {channel}: {source}")]
    NoteOff {
        number: u8,
        channel: u8,
        #[source]
        source: midi::Error,
    },

    #[error("unable to start sweep thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The notes currently sounding, keyed by (channel, number).
#[derive(Default)]
struct ActiveNotes {
    /// False while the silencer is stopped. Checked under the same lock as the
    /// notes so nothing can be registered after the final silence pass.
    accepting: bool,
    notes: HashMap<NoteKey, Note>,
}

impl ActiveNotes {
    /// Registers a note, replacing any note with the same key.
    fn register(&mut self, note: Note) -> Result<Option<Note>, Error> {
        if !self.accepting {
            return Err(Error::NotRunning);
        }
        Ok(self.notes.insert(note.key(), note))
    }

    /// Removes and returns every note due by the deadline.
    fn take_due(&mut self, deadline: Instant) -> Vec<Note> {
        let mut due: Vec<Note> = Vec::new();
        self.notes.retain(|_, note| {
            if note.is_due(deadline) {
                due.push(*note);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|note| note.key());
        due
    }

    /// Removes and returns every note regardless of expiration.
    fn take_all(&mut self) -> Vec<Note> {
        let mut all: Vec<Note> = self.notes.drain().map(|(_, note)| note).collect();
        all.sort_by_key(|note| note.key());
        all
    }
}

/// Everything one start/stop cycle shares with its sweep thread. A sweep thread
/// that stop gave up on keeps its own session and never sees a later one.
#[derive(Default)]
struct Session {
    /// Held while notes for this session are sent to the output. Always taken
    /// before the active notes lock, and never held by the active notes lock.
    emitting: Mutex<()>,
    active: Mutex<ActiveNotes>,
}

impl Session {
    fn accepting() -> Session {
        Session {
            emitting: Mutex::new(()),
            active: Mutex::new(ActiveNotes {
                accepting: true,
                notes: HashMap::new(),
            }),
        }
    }
}

/// Silences every note due within half a period of now. A zero period silences
/// every note. Notes are removed before their note off is sent, and the note off
/// is sent without holding the active notes lock.
fn sweep(
    session: &Session,
    output: &dyn Output,
    period: Duration,
    now: Instant,
) -> Result<usize, Error> {
    let _emitting = session.emitting.lock();
    let due = {
        let mut active = session.active.lock();
        if period.is_zero() {
            active.take_all()
        } else {
            active.take_due(now + period / 2)
        }
    };

    let mut result = Ok(due.len());
    for note in due {
        debug!(note = %note, "Silencing note.");
        if let Err(e) = output.note_off(note.number, note.velocity, note.channel) {
            warn!(note = %note, err = %e, "Unable to silence note.");
            if result.is_ok() {
                result = Err(Error::NoteOff {
                    number: note.number,
                    channel: note.channel,
                    source: e,
                });
            }
        }
    }
    result
}

fn run(
    session: Arc<Session>,
    output: Arc<dyn Output>,
    period: Duration,
    shutdown_rx: Receiver<Sender<()>>,
) {
    let span = span!(Level::INFO, "silencer");
    let _enter = span.enter();

    let ticker = tick(period);
    loop {
        select! {
            recv(ticker) -> _ => {
                if let Err(e) = sweep(&session, output.as_ref(), period, Instant::now()) {
                    error!(err = %e, "Error during sweep.");
                }
            }
            recv(shutdown_rx) -> ack => {
                match sweep(&session, output.as_ref(), Duration::ZERO, Instant::now()) {
                    Ok(count) => debug!(count, "Final silence pass complete."),
                    Err(e) => error!(err = %e, "Error during final silence pass."),
                }
                if let Ok(ack) = ack {
                    // Stop may have already given up waiting.
                    let _ = ack.send(());
                }
                return;
            }
        }
    }
}

struct Worker {
    session: Arc<Session>,
    shutdown_tx: Sender<Sender<()>>,
    handle: JoinHandle<()>,
}

/// Turns notes off once they expire.
pub struct Silencer {
    output: Arc<dyn Output>,
    period: Duration,
    stop_timeout: Duration,
    session: Mutex<Arc<Session>>,
    worker: Mutex<Option<Worker>>,
}

impl Silencer {
    /// Creates a stopped silencer that sweeps every period.
    pub fn new(output: Arc<dyn Output>, period: Duration) -> Result<Silencer, Error> {
        if period.is_zero() {
            return Err(Error::ZeroPeriod);
        }

        Ok(Silencer {
            output,
            period,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            session: Mutex::new(Arc::new(Session::default())),
            worker: Mutex::new(None),
        })
    }

    /// Sets how long stop waits for the sweep thread to acknowledge.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Silencer {
        self.stop_timeout = stop_timeout;
        self
    }

    /// The sweep period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts the sweep thread with an empty set of active notes.
    pub fn start(&self) -> Result<(), Error> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let session = Arc::new(Session::accepting());
        let (shutdown_tx, shutdown_rx) = bounded::<Sender<()>>(1);
        let handle = {
            let session = session.clone();
            let output = self.output.clone();
            let period = self.period;
            thread::Builder::new()
                .name("silencer".to_string())
                .spawn(move || run(session, output, period, shutdown_rx))?
        };

        *self.session.lock() = session.clone();
        *worker = Some(Worker {
            session,
            shutdown_tx,
            handle,
        });

        info!(
            device = self.output.name(),
            period = ?self.period,
            "Silencer started."
        );
        Ok(())
    }

    /// Stops the sweep thread. Blocks until the thread has silenced every active
    /// note and acknowledged, or until the stop timeout passes.
    pub fn stop(&self) -> Result<(), Error> {
        let worker = {
            let mut worker = self.worker.lock();
            let taken = worker.take().ok_or(Error::NotRunning)?;
            taken.session.active.lock().accepting = false;
            taken
        };

        let (ack_tx, ack_rx) = bounded::<()>(1);
        if worker.shutdown_tx.send(ack_tx).is_err() {
            warn!("Sweep thread exited early.");
        } else {
            match ack_rx.recv_timeout(self.stop_timeout) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    error!(
                        timeout = ?self.stop_timeout,
                        "Timed out waiting for the final silence pass, detaching sweep thread."
                    );
                    return Ok(());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Sweep thread exited without acknowledging shutdown.")
                }
            }
        }

        if worker.handle.join().is_err() {
            error!("Sweep thread panicked.");
        }

        info!("Silencer stopped.");
        Ok(())
    }

    /// Returns true between start and stop.
    pub fn is_running(&self) -> bool {
        self.session().active.lock().accepting
    }

    /// Registers a note for silencing. Does not emit anything; the caller is
    /// expected to have turned the note on already. Prefer note_on_with when a
    /// sweep could be silencing the same key.
    pub fn note_on(&self, note: Note) -> Result<(), Error> {
        if let Some(replaced) = self.session().active.lock().register(note)? {
            debug!(note = %replaced, "Replaced sounding note.");
        }
        Ok(())
    }

    /// Turns the note on with emit and registers it. No sweep can send a note off
    /// between the two, so a registered key was always turned on last. Nothing is
    /// emitted while stopped.
    pub fn note_on_with<F, E>(&self, note: Note, emit: F) -> Result<(), E>
    where
        F: FnOnce(&Note) -> Result<(), E>,
        E: From<Error>,
    {
        let session = self.session();
        let _emitting = session.emitting.lock();
        if !session.active.lock().accepting {
            return Err(Error::NotRunning.into());
        }

        emit(&note)?;
        let registered = session.active.lock().register(note);
        match registered {
            Ok(Some(replaced)) => debug!(note = %replaced, "Replaced sounding note."),
            Ok(None) => {}
            Err(e) => {
                // Stopped after the check above, nothing else will turn it off.
                if let Err(off_err) = self
                    .output
                    .note_off(note.number, note.velocity, note.channel)
                {
                    warn!(note = %note, err = %off_err, "Unable to silence unregistered note.");
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Registers several notes at once.
    pub fn note_on_all<I>(&self, notes: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Note>,
    {
        let session = self.session();
        let mut active = session.active.lock();
        for note in notes {
            active.register(note)?;
        }
        Ok(())
    }

    /// Immediately silences every active note, regardless of expiration. Returns
    /// the number of notes that were silenced.
    pub fn silence_all(&self) -> Result<usize, Error> {
        let session = self.session();
        if !session.active.lock().accepting {
            return Err(Error::NotRunning);
        }
        sweep(
            &session,
            self.output.as_ref(),
            Duration::ZERO,
            Instant::now(),
        )
    }

    /// The number of notes currently being tracked.
    pub fn active_count(&self) -> usize {
        self.session().active.lock().notes.len()
    }

    fn session(&self) -> Arc<Session> {
        self.session.lock().clone()
    }
}

impl Drop for Silencer {
    fn drop(&mut self) {
        if self.worker.lock().is_some() {
            if let Err(e) = self.stop() {
                error!(err = %e, "Error stopping silencer.");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use midly::{live::LiveEvent, MidiMessage};

    use crate::{
        midi::{self, Note, NoteKey, Output as _},
        testutil::eventually,
    };

    use super::{sweep, Error, Session, Silencer};

    const PERIOD: Duration = Duration::from_millis(100);

    fn key(channel: u8, number: u8) -> NoteKey {
        NoteKey { channel, number }
    }

    fn session(notes: &[Note]) -> Session {
        let session = Session::accepting();
        for note in notes {
            session
                .active
                .lock()
                .register(*note)
                .expect("accepting notes");
        }
        session
    }

    #[test]
    fn sweep_uses_half_period_lookahead() -> Result<(), Error> {
        let output = midi::test::Output::get("mock");
        let now = Instant::now();
        let session = session(&[
            Note::expiring_at(60, 127, 0, now + Duration::from_millis(40)),
            Note::expiring_at(62, 127, 0, now + Duration::from_millis(50)),
            Note::expiring_at(64, 127, 0, now + Duration::from_millis(60)),
            Note::sustained(67, 127, 0),
        ]);

        assert_eq!(2, sweep(&session, &output, PERIOD, now)?);
        assert_eq!(vec![key(0, 60), key(0, 62)], output.note_offs());
        assert_eq!(2, session.active.lock().notes.len());

        // Much later, only the sustained note remains.
        assert_eq!(1, sweep(&session, &output, PERIOD, now + PERIOD)?);
        assert_eq!(
            vec![key(0, 60), key(0, 62), key(0, 64)],
            output.note_offs()
        );
        assert!(session.active.lock().notes.contains_key(&key(0, 67)));
        Ok(())
    }

    #[test]
    fn zero_period_silences_everything_once() -> Result<(), Error> {
        let output = midi::test::Output::get("mock");
        let now = Instant::now();
        let session = session(&[
            Note::expiring_at(60, 127, 0, now + Duration::from_secs(60)),
            Note::sustained(60, 127, 1),
            Note::sustained(72, 90, 1),
        ]);

        assert_eq!(3, sweep(&session, &output, Duration::ZERO, now)?);
        assert_eq!(
            vec![key(0, 60), key(1, 60), key(1, 72)],
            output.note_offs()
        );
        assert!(session.active.lock().notes.is_empty());

        assert_eq!(0, sweep(&session, &output, Duration::ZERO, now)?);
        assert_eq!(3, output.note_offs().len());
        Ok(())
    }

    #[test]
    fn replacement_keeps_the_latest_expiration() -> Result<(), Error> {
        let output = midi::test::Output::get("mock");
        let now = Instant::now();
        let session = session(&[]);
        for i in 0..5 {
            session.active.lock().register(Note::expiring_at(
                60,
                100 + i,
                0,
                now + Duration::from_millis(10 * u64::from(i)),
            ))?;
        }

        assert_eq!(1, session.active.lock().notes.len());
        let latest = session.active.lock().notes[&key(0, 60)];
        assert_eq!(104, latest.velocity);
        assert_eq!(Some(now + Duration::from_millis(40)), latest.expiration);

        assert_eq!(1, sweep(&session, &output, PERIOD, now + PERIOD)?);
        assert_eq!(vec![key(0, 60)], output.note_offs());
        Ok(())
    }

    #[test]
    fn failed_note_off_still_removes_note() {
        let output = midi::test::Output::get("mock");
        let now = Instant::now();
        let session = session(&[
            Note::expiring_at(60, 127, 0, now),
            Note::expiring_at(62, 127, 0, now),
        ]);
        output.fail_next_note_offs(1);

        let result = sweep(&session, &output, PERIOD, now);

        assert!(matches!(
            result,
            Err(Error::NoteOff {
                number: 60,
                channel: 0,
                ..
            })
        ));
        assert_eq!(vec![key(0, 62)], output.note_offs());
        assert!(session.active.lock().notes.is_empty());
    }

    #[test]
    fn usage_errors() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        assert!(matches!(
            Silencer::new(output.clone(), Duration::ZERO),
            Err(Error::ZeroPeriod)
        ));

        let silencer = Silencer::new(output.clone(), PERIOD)?;
        assert!(!silencer.is_running());
        assert!(matches!(
            silencer.note_on(Note::sustained(60, 127, 0)),
            Err(Error::NotRunning)
        ));
        assert!(matches!(silencer.silence_all(), Err(Error::NotRunning)));
        assert!(matches!(silencer.stop(), Err(Error::NotRunning)));

        silencer.start()?;
        assert!(matches!(silencer.start(), Err(Error::AlreadyRunning)));
        silencer.stop()?;

        assert!(matches!(
            silencer.note_on(Note::sustained(60, 127, 0)),
            Err(Error::NotRunning)
        ));
        Ok(())
    }

    #[test]
    fn expired_note_is_silenced_within_bound() -> Result<(), Box<dyn std::error::Error>> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Silencer::new(output.clone(), PERIOD)?;
        silencer.start()?;

        let start = Instant::now();
        output.note_on(60, 127, 0)?;
        silencer.note_on(Note::timed(60, 127, 0, Duration::from_millis(50)))?;
        thread::sleep(Duration::from_millis(300));

        let offs = output.timed_note_offs();
        assert_eq!(1, offs.len());
        assert_eq!(key(0, 60), offs[0].1);
        assert!(offs[0].0.duration_since(start) <= Duration::from_millis(150));
        assert_eq!(0, silencer.active_count());

        silencer.stop()?;
        assert_eq!(1, output.note_offs().len());
        Ok(())
    }

    #[test]
    fn rapid_retrigger_is_silenced_once() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Silencer::new(output.clone(), PERIOD)?;
        silencer.start()?;

        for _ in 0..5 {
            silencer.note_on(Note::timed(64, 127, 2, Duration::from_millis(20)))?;
        }
        assert_eq!(1, silencer.active_count());

        eventually(
            || silencer.active_count() == 0,
            "Note was never silenced",
        );
        thread::sleep(PERIOD * 2);
        assert_eq!(vec![key(2, 64)], output.note_offs());

        silencer.stop()?;
        assert_eq!(vec![key(2, 64)], output.note_offs());
        Ok(())
    }

    #[test]
    fn note_on_all_registers_every_note() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Silencer::new(output.clone(), PERIOD)?;
        silencer.start()?;

        silencer.note_on_all([
            Note::sustained(60, 127, 0),
            Note::sustained(64, 127, 0),
            Note::sustained(67, 127, 0),
        ])?;
        assert_eq!(3, silencer.active_count());

        assert_eq!(3, silencer.silence_all()?);
        assert_eq!(0, silencer.active_count());
        assert!(silencer.is_running());

        silencer.stop()?;
        assert_eq!(3, output.note_offs().len());
        Ok(())
    }

    #[test]
    fn stop_silences_sustained_notes_and_ends_sweeping() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Silencer::new(output.clone(), PERIOD)?;
        silencer.start()?;

        silencer.note_on(Note::sustained(60, 127, 0))?;
        silencer.note_on(Note::timed(62, 127, 0, Duration::from_secs(60)))?;
        thread::sleep(PERIOD * 2);
        assert!(output.note_offs().is_empty());

        silencer.stop()?;
        assert_eq!(vec![key(0, 60), key(0, 62)], output.note_offs());
        assert!(!silencer.is_running());
        assert_eq!(0, silencer.active_count());

        let emitted = output.events().len();
        thread::sleep(PERIOD * 3);
        assert_eq!(emitted, output.events().len());
        Ok(())
    }

    #[test]
    fn restart_begins_with_no_active_notes() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Silencer::new(output.clone(), PERIOD)?;

        silencer.start()?;
        silencer.note_on(Note::sustained(60, 127, 0))?;
        silencer.stop()?;

        silencer.start()?;
        assert_eq!(0, silencer.active_count());
        silencer.note_on(Note::sustained(61, 127, 0))?;
        silencer.stop()?;

        assert_eq!(vec![key(0, 60), key(0, 61)], output.note_offs());
        Ok(())
    }

    #[test]
    fn drop_stops_running_silencer() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        {
            let silencer = Silencer::new(output.clone(), PERIOD)?;
            silencer.start()?;
            silencer.note_on(Note::sustained(60, 127, 0))?;
        }
        assert_eq!(vec![key(0, 60)], output.note_offs());
        Ok(())
    }

    #[test]
    fn retrigger_during_sweep_is_not_cut_short() -> Result<(), Box<dyn std::error::Error>> {
        let output = Arc::new(midi::test::Output::get("mock"));
        output.delay_note_offs(Duration::from_millis(50));
        let silencer = Silencer::new(output.clone(), Duration::from_millis(20))?;
        silencer.start()?;

        let play = |note: Note| {
            silencer.note_on_with(note, |note| -> Result<(), Box<dyn std::error::Error>> {
                Ok(output.note_on(note.number, note.velocity, note.channel)?)
            })
        };

        play(Note::expiring_at(60, 127, 0, Instant::now()))?;
        // The first sweep is now busy turning the note off.
        thread::sleep(Duration::from_millis(30));
        play(Note::timed(60, 127, 0, Duration::from_secs(10)))?;
        thread::sleep(Duration::from_millis(100));

        assert_eq!(1, silencer.active_count());
        let last = output
            .events()
            .into_iter()
            .rev()
            .find_map(|event| match event {
                LiveEvent::Midi { message, .. } => Some(message),
                _ => None,
            });
        assert!(matches!(last, Some(MidiMessage::NoteOn { .. })));
        assert_eq!(2, output.note_ons().len());
        assert!(output.note_offs().len() <= 1);

        silencer.stop()?;
        Ok(())
    }

    #[test]
    fn note_on_with_emits_nothing_while_stopped() -> Result<(), Box<dyn std::error::Error>> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Silencer::new(output.clone(), PERIOD)?;

        let result: Result<(), Box<dyn std::error::Error>> =
            silencer.note_on_with(Note::sustained(60, 127, 0), |note| {
                Ok(output.note_on(note.number, note.velocity, note.channel)?)
            });

        assert_eq!(
            Some("silencer is not running".to_string()),
            result.err().map(|e| e.to_string())
        );
        assert!(output.events().is_empty());
        Ok(())
    }

    #[test]
    fn detached_sweep_thread_leaves_restart_alone() -> Result<(), Box<dyn std::error::Error>> {
        let output = Arc::new(midi::test::Output::get("mock"));
        output.delay_note_offs(Duration::from_millis(200));
        let silencer = Silencer::new(output.clone(), Duration::from_millis(20))?
            .with_stop_timeout(Duration::from_millis(20));
        silencer.start()?;

        silencer.note_on(Note::expiring_at(60, 127, 0, Instant::now()))?;
        // The sweep thread is stuck in the slow note off, so stop gives up on it.
        thread::sleep(Duration::from_millis(30));
        silencer.stop()?;

        silencer.start()?;
        silencer.note_on(Note::sustained(72, 127, 0))?;
        thread::sleep(Duration::from_millis(300));

        assert!(silencer.is_running());
        assert_eq!(1, silencer.active_count());
        assert_eq!(vec![key(0, 60)], output.note_offs());
        Ok(())
    }

    #[test]
    fn concurrent_start_and_stop_stay_consistent() -> Result<(), Error> {
        let output = Arc::new(midi::test::Output::get("mock"));
        let silencer = Arc::new(Silencer::new(output, Duration::from_millis(5))?);

        let stopper = {
            let silencer = silencer.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let _ = silencer.stop();
                }
            })
        };
        for _ in 0..200 {
            let _ = silencer.start();
        }
        assert!(stopper.join().is_ok());

        // Never registered as running without accepting notes, or the reverse.
        assert_eq!(silencer.worker.lock().is_some(), silencer.is_running());
        if silencer.is_running() {
            silencer.note_on(Note::sustained(60, 127, 0))?;
            silencer.stop()?;
        }
        assert!(!silencer.is_running());
        silencer.start()?;
        assert!(silencer.is_running());
        silencer.stop()?;
        Ok(())
    }
}
