//! Ctrl-C routing for the interactive client.
//!
//! One listener lives for the whole process. An interrupt cancels the
//! cycle in flight if there is one; otherwise it requests shutdown.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

/// What an interrupt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    CycleCancelled,
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    active: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new cycle and return the token that cancels it.
    pub fn begin_cycle(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active() = Some(token.clone());
        token
    }

    pub fn end_cycle(&self) {
        self.active().take();
    }

    /// Route one interrupt.
    pub fn interrupt(&self) -> Interrupted {
        match self.active().take() {
            Some(token) => {
                token.cancel();
                Interrupted::CycleCancelled
            }
            None => {
                self.shutdown.cancel();
                Interrupted::Shutdown
            }
        }
    }

    /// Cancelled once an interrupt arrives while no cycle is running.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Listen for Ctrl-C until shutdown is requested.
    pub async fn listen(self) {
        while tokio::signal::ctrl_c().await.is_ok() {
            match self.interrupt() {
                Interrupted::CycleCancelled => tracing::info!("Interrupt: cancelling current query"),
                Interrupted::Shutdown => {
                    tracing::info!("Interrupt: shutting down");
                    break;
                }
            }
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_cancels_running_cycle() {
        let interrupts = Interrupts::new();
        let token = interrupts.begin_cycle();

        assert_eq!(interrupts.interrupt(), Interrupted::CycleCancelled);
        assert!(token.is_cancelled());
        assert!(!interrupts.shutdown().is_cancelled());
    }

    #[test]
    fn test_interrupt_while_idle_requests_shutdown() {
        let interrupts = Interrupts::new();
        assert_eq!(interrupts.interrupt(), Interrupted::Shutdown);
        assert!(interrupts.shutdown().is_cancelled());
    }

    #[test]
    fn test_repeated_interrupts_across_cycles() {
        let interrupts = Interrupts::new();

        let first = interrupts.begin_cycle();
        assert_eq!(interrupts.interrupt(), Interrupted::CycleCancelled);
        interrupts.end_cycle();

        let second = interrupts.begin_cycle();
        interrupts.end_cycle();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        let third = interrupts.begin_cycle();
        assert_eq!(interrupts.interrupt(), Interrupted::CycleCancelled);
        assert!(third.is_cancelled());
        interrupts.end_cycle();

        assert_eq!(interrupts.interrupt(), Interrupted::Shutdown);
    }
}
