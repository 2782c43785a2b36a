//! Raw-mode terminal that restores itself on drop.

use anyhow::Result;
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Owns the TUI terminal for the lifetime of a form.
///
/// Restoration runs on normal exit, on `?` early returns and (through
/// [`install_panic_hook`]) on panics.
pub struct TerminalGuard {
    terminal: Option<Tui>,
    active: AtomicBool,
}

impl TerminalGuard {
    /// Enter raw mode and the alternate screen
    pub fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            Self::restore();
            return Err(err.into());
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal: Some(terminal),
            active: AtomicBool::new(true),
        })
    }

    pub fn terminal(&mut self) -> Result<&mut Tui> {
        self.terminal
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("terminal already restored"))
    }

    /// Leave the alternate screen and raw mode; safe to call repeatedly
    pub fn restore() {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
        let _ = io::stdout().flush();
    }

    fn release(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.terminal = None;
            Self::restore();
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Restore the terminal before the default hook prints the panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        TerminalGuard::restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inactive() -> TerminalGuard {
        TerminalGuard {
            terminal: None,
            active: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_release_runs_once() {
        let mut guard = TerminalGuard {
            terminal: None,
            active: AtomicBool::new(true),
        };
        guard.release();
        assert!(!guard.active.load(Ordering::SeqCst));
        guard.release();
        assert!(!guard.active.load(Ordering::SeqCst));
    }

    #[test]
    fn test_terminal_missing_after_release() {
        let mut guard = inactive();
        assert!(guard.terminal().is_err());
    }

    #[test]
    fn test_restore_is_callable_without_tty() {
        TerminalGuard::restore();
    }
}
