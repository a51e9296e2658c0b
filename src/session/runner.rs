// Fixed-rate UI loop driving a KaraokeSession
//
// Drains pending commands, ticks the session, then sleeps for the rest of
// the frame. A fault escaping a tick shuts the session down (analyzer
// stopped, devices released) before the error is returned.

use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{KaraokeSession, SessionCommand, SessionState};
use crate::error::{log_session_error, SessionError};

/// When the runner returns on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Keep running until a `Quit` command arrives
    UntilQuit,
    /// Return once the queued song has been scored (or failed to start)
    PlayOnce,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub final_state: SessionState,
    pub last_score: Option<u8>,
}

type TickObserver = Box<dyn FnMut(&KaraokeSession) + Send>;

pub struct SessionRunner {
    session: KaraokeSession,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    frame: Duration,
    mode: RunMode,
    observer: Option<TickObserver>,
}

impl SessionRunner {
    /// Wrap `session`; the returned sender feeds commands into the loop.
    pub fn new(
        session: KaraokeSession,
        mode: RunMode,
    ) -> (Self, mpsc::UnboundedSender<SessionCommand>) {
        let tick_hz = session.config().session.tick_hz.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Self {
            session,
            commands: rx,
            frame: Duration::from_secs(1) / tick_hz,
            mode,
            observer: None,
        };
        (runner, tx)
    }

    /// Called after every tick, e.g. to render the lyrics.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&KaraokeSession) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn session(&self) -> &KaraokeSession {
        &self.session
    }

    pub fn into_session(self) -> KaraokeSession {
        self.session
    }

    pub fn run(&mut self) -> Result<RunSummary, SessionError> {
        tracing::info!(
            "[SessionRunner] Starting loop at {:?} per tick ({:?})",
            self.frame,
            self.mode
        );
        let mut ticks = 0_u64;

        loop {
            let frame_start = Instant::now();

            if self.drain_commands() {
                tracing::info!("[SessionRunner] Quit requested");
                break;
            }

            if let Err(err) = self.session.tick() {
                log_session_error(&err, "SessionRunner::tick");
                self.session.shutdown();
                return Err(err);
            }
            ticks += 1;

            if let Some(observer) = self.observer.as_mut() {
                observer(&self.session);
            }

            if self.mode == RunMode::PlayOnce && self.play_once_done() {
                break;
            }

            let spent = frame_start.elapsed();
            if spent < self.frame {
                thread::sleep(self.frame - spent);
            }
        }

        self.session.shutdown();
        Ok(RunSummary {
            ticks,
            final_state: self.session.state(),
            last_score: self.session.last_score(),
        })
    }

    /// Apply pending commands; returns true when a quit was requested.
    fn drain_commands(&mut self) -> bool {
        while let Ok(command) = self.commands.try_recv() {
            if command == SessionCommand::Quit {
                return true;
            }
            if let Err(err) = self.session.handle(command) {
                log_session_error(&err, "SessionRunner::handle");
            }
        }
        false
    }

    fn play_once_done(&self) -> bool {
        match self.session.state() {
            SessionState::Score => true,
            SessionState::Menu => self.session.queue_len() == 0,
            _ => false,
        }
    }
}
