//! The host's primary thread.
//!
//! [`MainLoop`] runs a dedicated thread that drains a task queue and fires tick
//! hooks at a fixed cadence. It owns the live population (who is online) and is
//! the only thread allowed to touch the statistic cache.

use std::collections::HashSet;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam::channel::{bounded, select, tick, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::confined::Confined;
use crate::context::{PendingCall, PrimaryScheduler, PrimaryTask, TaskFault};
use crate::model::PlayerId;

type Job = Box<dyn FnOnce() + Send + 'static>;
type TickHook = Box<dyn FnMut() + Send + 'static>;

enum Message {
    Run(Job),
    AddTickHook(TickHook),
    Shutdown,
}

pub struct MainLoop {
    thread_id: ThreadId,
    tx: Sender<Message>,
    online: Arc<Confined<HashSet<PlayerId>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MainLoop {
    /// Spawns the primary thread. Tick hooks fire every `tick_interval`.
    pub fn start(tick_interval: Duration) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Message>();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("main-loop".to_string())
            .spawn(move || {
                let online = Arc::new(Confined::new(HashSet::new()));
                let _ = ready_tx.send((thread::current().id(), online));
                run(rx, tick_interval);
            })?;

        let (thread_id, online) = ready_rx.recv().map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "main loop exited during startup")
        })?;

        log::info!("[MAIN] main loop started (tick every {:?})", tick_interval);
        Ok(Self {
            thread_id,
            tx,
            online,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_primary_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queues `task` on the primary thread and returns its pending result.
    /// A panic inside the task is reported as a [`TaskFault`].
    pub fn call<T, F>(&self, task: F) -> PendingCall<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (completer, pending) = PendingCall::channel();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).map_err(TaskFault::from_panic);
            completer.complete(outcome);
        });
        // After shutdown the job is dropped here, which cancels the call.
        let _ = self.tx.send(Message::Run(job));
        pending
    }

    /// Runs `task` on the primary thread: inline when already there, queued otherwise.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_primary_thread() {
            task();
        } else {
            let _ = self.tx.send(Message::Run(Box::new(task)));
        }
    }

    /// Registers a hook fired on every tick and once more at shutdown.
    pub fn on_tick<F>(&self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        let _ = self.tx.send(Message::AddTickHook(Box::new(hook)));
    }

    /// Marks a player online.
    pub fn connect(&self, player: PlayerId) {
        let online = Arc::clone(&self.online);
        self.execute(move || {
            let _ = online.with(|players| players.insert(player));
            log::debug!("[MAIN] player {} connected", player);
        });
    }

    pub fn disconnect(&self, player: PlayerId) {
        let online = Arc::clone(&self.online);
        self.execute(move || {
            let _ = online.with(|players| players.remove(&player));
            log::debug!("[MAIN] player {} disconnected", player);
        });
    }

    /// Runs the tick hooks a final time, stops the thread, and cancels whatever is
    /// still queued. Idempotent.
    pub fn shutdown(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = self.tx.send(Message::Shutdown);
            if handle.join().is_err() {
                log::error!("[MAIN] main loop thread panicked");
            }
            log::info!("[MAIN] main loop stopped");
        }
    }
}

impl PrimaryScheduler for MainLoop {
    fn is_primary_thread(&self) -> bool {
        MainLoop::is_primary_thread(self)
    }

    fn is_online(&self, player: PlayerId) -> bool {
        self.online
            .with(|players| players.contains(&player))
            .unwrap_or(false)
    }

    fn call_sync(&self, task: PrimaryTask<bool>) -> PendingCall<bool> {
        self.call(task)
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        if !self.is_primary_thread() {
            self.shutdown();
        }
    }
}

fn run(rx: Receiver<Message>, tick_interval: Duration) {
    let ticker = tick(tick_interval);
    let mut hooks: Vec<TickHook> = Vec::new();

    loop {
        let keep_running = select! {
            recv(rx) -> message => match message {
                Ok(Message::Run(job)) => {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("[MAIN] queued task panicked");
                    }
                    true
                }
                Ok(Message::AddTickHook(hook)) => {
                    hooks.push(hook);
                    true
                }
                Ok(Message::Shutdown) | Err(_) => false,
            },
            recv(ticker) -> _ => {
                fire(&mut hooks);
                true
            }
        };
        if !keep_running {
            break;
        }
    }

    fire(&mut hooks);
    // Queued jobs are dropped with `rx`, cancelling their pending calls.
}

fn fire(hooks: &mut [TickHook]) {
    for hook in hooks.iter_mut() {
        if panic::catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
            log::error!("[MAIN] tick hook panicked");
        }
    }
}
