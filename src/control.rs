//! Stop signal and keyboard exit (Esc)

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const KEY_POLL: Duration = Duration::from_millis(50);

/// Shared "please stop" flag
#[derive(Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Keys that end the session: Esc, `q`, Ctrl+C
pub fn is_exit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Watches the keyboard and triggers the stop signal on an exit key.
///
/// Puts the terminal in raw mode for the lifetime of the watcher so single
/// key presses arrive without Enter; raw mode is restored on drop.
pub struct KeyboardExit {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardExit {
    /// Start watching. Returns `None` when stdin is not a terminal.
    pub fn install(stop: StopSignal) -> io::Result<Option<Self>> {
        if !io::stdin().is_terminal() {
            debug!("stdin is not a terminal, keyboard exit disabled");
            return Ok(None);
        }

        terminal::enable_raw_mode()?;

        let done = Arc::new(AtomicBool::new(false));
        let watcher_done = done.clone();
        let spawned = thread::Builder::new()
            .name("keyboard-exit".to_string())
            .spawn(move || watch_keys(stop, watcher_done));

        match spawned {
            Ok(handle) => Ok(Some(Self {
                done,
                handle: Some(handle),
            })),
            Err(e) => {
                let _ = terminal::disable_raw_mode();
                Err(e)
            }
        }
    }
}

impl Drop for KeyboardExit {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

fn watch_keys(stop: StopSignal, done: Arc<AtomicBool>) {
    while !done.load(Ordering::SeqCst) && !stop.is_triggered() {
        match event::poll(KEY_POLL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if is_exit_key(&key) => {
                    info!("Exit key pressed");
                    stop.trigger();
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Keyboard read failed: {}", e);
                    return;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("Keyboard poll failed: {}", e);
                return;
            }
        }
    }
}
