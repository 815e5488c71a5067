//! Dedicated thread owning one WASAPI stream.
//!
//! COM objects never leave the thread. The owner drives it with
//! [`Command`]s; start and pause wait for the thread's answer so their
//! errors reach the caller synchronously. A request that finds the stream
//! already ended on its own succeeds; the end arrives through `on_stopped`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use voice_recorder_core::{SessionError, StreamFormat, StreamStoppedCallback};

use crate::com::ComScope;
use crate::error::WasapiError;

type Reply = SyncSender<Result<(), SessionError>>;

pub(crate) enum Command {
    Start(Reply),
    Pause(Reply),
    Stop,
}

/// How a stream loop ended.
pub(crate) enum Exit {
    /// The owner sent `Stop` or went away.
    Requested,
    /// The stream ran out of data on its own.
    EndOfStream,
}

/// Receiving end given to the stream loop.
pub(crate) struct Control {
    commands: Receiver<Command>,
}

impl Control {
    /// Next command. Blocks while the stream is idle, polls while it runs.
    pub(crate) fn next(&self, running: bool) -> Option<Command> {
        if running {
            match self.commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Command::Stop),
            }
        } else {
            Some(self.commands.recv().unwrap_or(Command::Stop))
        }
    }
}

pub(crate) struct Worker {
    name: &'static str,
    commands: Sender<Command>,
    /// Set before the command channel closes when `run` ends on its own.
    ended: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a stream thread and wait until `setup` has run on it.
    ///
    /// `setup` opens the stream and reports its format; `run` then serves
    /// commands until stopped. A `run` that ends on its own reports through
    /// `on_stopped`; one ended by `Stop`, or a failed `setup`, does not.
    pub(crate) fn spawn<S, Setup, Run>(
        name: &'static str,
        on_stopped: StreamStoppedCallback,
        setup: Setup,
        run: Run,
    ) -> Result<(Self, StreamFormat), SessionError>
    where
        Setup: FnOnce() -> Result<(S, StreamFormat), SessionError> + Send + 'static,
        Run: FnOnce(S, &Control) -> Result<Exit, SessionError> + Send + 'static,
    {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let ended = Arc::new(AtomicBool::new(false));
        let ended_by_stream = Arc::clone(&ended);

        let thread = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let _com = match ComScope::enter() {
                    Ok(scope) => scope,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                let stream = match setup() {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let control = Control { commands: receiver };
                let exit = run(stream, &control);
                if !matches!(exit, Ok(Exit::Requested)) {
                    ended_by_stream.store(true, Ordering::Release);
                }
                drop(control);

                match exit {
                    Ok(Exit::Requested) => log::debug!("{} stopped", name),
                    Ok(Exit::EndOfStream) => {
                        log::debug!("{} reached end of stream", name);
                        on_stopped(None);
                    }
                    Err(e) => {
                        log::error!("{} failed: {}", name, e);
                        on_stopped(Some(e));
                    }
                }
            })
            .map_err(|e| SessionError::from(WasapiError::Thread(format!("failed to spawn {}: {}", name, e))))?;

        let mut worker = Self {
            name,
            commands,
            ended,
            thread: Some(thread),
        };
        match ready_rx.recv() {
            Ok(Ok(format)) => Ok((worker, format)),
            Ok(Err(e)) => {
                worker.join();
                Err(e)
            }
            Err(_) => {
                worker.join();
                Err(WasapiError::Thread(format!("{} exited during setup", name)).into())
            }
        }
    }

    pub(crate) fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start)
    }

    pub(crate) fn pause(&self) -> Result<(), SessionError> {
        self.request(Command::Pause)
    }

    /// Stop the thread and wait for it, unless called from the thread itself.
    pub(crate) fn stop(&mut self) -> Result<(), SessionError> {
        let _ = self.commands.send(Command::Stop);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        if thread.thread().id() == thread::current().id() {
            // Called from a callback on this thread; the loop exits when it returns.
            return Ok(());
        }
        thread
            .join()
            .map_err(|_| WasapiError::Thread(format!("{} panicked", self.name)).into())
    }

    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), SessionError> {
        let (reply, answer) = mpsc::sync_channel(1);
        let delivered = match self.commands.send(command(reply)) {
            Ok(()) => answer.recv().ok(),
            Err(_) => None,
        };
        match delivered {
            Some(result) => result,
            None if self.ended.load(Ordering::Acquire) => {
                log::debug!("{} already ended; request dropped", self.name);
                Ok(())
            }
            None => Err(WasapiError::Thread(format!("{} is not running", self.name)).into()),
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{}: {}", self.name, e);
        }
    }
}
