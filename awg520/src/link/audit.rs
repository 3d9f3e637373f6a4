use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use awg520_core::link::{Link, LinkError};
use awg520_core::scpi::Command;
use awg520_emulator::Awg520Emulator;

/// Configuration of an [`Audit`] link.
#[derive(Default, Clone, Copy)]
#[doc(hidden)]
pub struct AuditOption {
    /// Every command and transfer fails while the link is broken.
    pub broken: bool,
    /// Fail the nth software jump (1-based) instead of delivering it.
    pub fail_on_jump: Option<u32>,
}

struct Inner {
    emulator: Awg520Emulator,
    commands: Vec<Command>,
    is_open: bool,
    broken: bool,
    jumps_seen: u32,
    closes: u32,
}

/// A test link backed by [`Awg520Emulator`].
///
/// Clones share one emulated instrument, so a test can keep a handle while
/// the driver owns the link. The emulated mass storage survives reopening,
/// like the instrument's does.
#[derive(Clone)]
#[doc(hidden)]
pub struct Audit {
    option: AuditOption,
    inner: Arc<Mutex<Inner>>,
}

impl Audit {
    pub fn new(option: AuditOption) -> Self {
        Self {
            option,
            inner: Arc::new(Mutex::new(Inner {
                emulator: Awg520Emulator::new(),
                commands: Vec::new(),
                is_open: false,
                broken: false,
                jumps_seen: 0,
                closes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of times the link has been closed.
    pub fn closes(&self) -> u32 {
        self.lock().closes
    }

    /// Every command delivered or rejected so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().commands.clone()
    }

    /// Runs `f` against the emulated instrument.
    pub fn with_emulator<R>(&self, f: impl FnOnce(&Awg520Emulator) -> R) -> R {
        f(&self.lock().emulator)
    }
}

impl Link for Audit {
    fn open(&mut self) -> Result<(), LinkError> {
        let mut inner = self.lock();
        inner.is_open = true;
        inner.broken = self.option.broken;
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        let mut inner = self.lock();
        inner.is_open = false;
        inner.closes += 1;
        Ok(())
    }

    fn send(&mut self, command: &Command) -> Result<(), LinkError> {
        let mut inner = self.lock();
        if !inner.is_open {
            return Err(LinkError::closed());
        }
        if inner.broken {
            return Err(LinkError::new("broken"));
        }
        inner.commands.push(command.clone());
        if matches!(command, Command::SoftJump(_)) {
            inner.jumps_seen += 1;
            if self.option.fail_on_jump == Some(inner.jumps_seen) {
                return Err(LinkError::new("injected jump failure"));
            }
        }
        inner
            .emulator
            .execute(command)
            .map_err(|e| LinkError::new(e.to_string()))?;
        Ok(())
    }

    fn query(&mut self, command: &Command) -> Result<String, LinkError> {
        let mut inner = self.lock();
        if !inner.is_open {
            return Err(LinkError::closed());
        }
        if inner.broken {
            return Err(LinkError::new("broken"));
        }
        inner.commands.push(command.clone());
        inner
            .emulator
            .execute(command)
            .map_err(|e| LinkError::new(e.to_string()))?
            .ok_or_else(|| LinkError::new(format!("No response to {command}")))
    }

    fn send_file(&mut self, name: &str, contents: &[u8]) -> Result<(), LinkError> {
        let mut inner = self.lock();
        if !inner.is_open {
            return Err(LinkError::closed());
        }
        if inner.broken {
            return Err(LinkError::new("broken"));
        }
        inner.emulator.store_file(name, contents);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().is_open
    }
}
