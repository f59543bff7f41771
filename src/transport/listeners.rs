use crate::foundation::error::BeatlineResult;

/// Boxed listener callback for events of type `E`.
pub type Listener<E> = Box<dyn FnMut(&E) -> BeatlineResult<()>>;

/// Ordered listener list.
///
/// Dispatch is synchronous and in registration order. A listener that fails is
/// logged and skipped; the remaining listeners still run.
pub struct Listeners<E> {
    items: Vec<Listener<E>>,
}

impl<E> Listeners<E> {
    /// Empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append a listener.
    pub fn push(&mut self, listener: impl FnMut(&E) -> BeatlineResult<()> + 'static) {
        self.items.push(Box::new(listener));
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are none.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Invoke every listener with `event`; returns how many failed.
    pub fn dispatch(&mut self, event: &E, label: &str) -> usize {
        let mut failures = 0;
        for (index, listener) in self.items.iter_mut().enumerate() {
            if let Err(err) = listener(event) {
                failures += 1;
                tracing::warn!(label, index, %err, "listener failed");
            }
        }
        failures
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transport/listeners.rs"]
mod tests;
