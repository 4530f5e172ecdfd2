//! Proxy lifecycle (component G, spec.md §4.8): every structure proxy
//! handed out to a caller increments a shared counter on creation and
//! decrements it on drop. `close()` refuses while the counter is nonzero.
//! The three roots (root value, string registry, persisted type list) are
//! never wrapped in a counted proxy, so they never contribute to it.

use std::cell::Cell;
use std::rc::Rc;

/// Shared outstanding-proxy counter, cloned into every live proxy.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProxyCounter(Rc<Cell<u32>>);

impl ProxyCounter {
    pub(crate) fn new() -> Self {
        ProxyCounter(Rc::new(Cell::new(0)))
    }

    pub(crate) fn outstanding(&self) -> u32 {
        self.0.get()
    }

    pub(crate) fn spawn(&self) -> ProxyTicket {
        self.0.set(self.0.get() + 1);
        ProxyTicket(self.0.clone())
    }
}

/// Held by one live proxy; decrements the shared counter when dropped.
#[derive(Debug)]
pub(crate) struct ProxyTicket(Rc<Cell<u32>>);

impl Drop for ProxyTicket {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}
