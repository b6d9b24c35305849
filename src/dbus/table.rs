//! Method table mapping (interface, method) pairs to handlers.

use zbus::Message;

use crate::error::TableError;

/// A callable bound to one bus method.
///
/// Returning `None` means no reply could be built; the dispatcher logs it and
/// leaves the call unanswered.
pub trait MethodHandler<R: ?Sized> {
    fn call(&self, registry: &R, request: &Message) -> Option<Message>;
}

impl<R: ?Sized, F> MethodHandler<R> for F
where
    F: Fn(&R, &Message) -> Option<Message>,
{
    fn call(&self, registry: &R, request: &Message) -> Option<Message> {
        self(registry, request)
    }
}

pub struct MethodEntry<R: ?Sized> {
    interface: String,
    method: String,
    handler: Box<dyn MethodHandler<R>>,
}

impl<R: ?Sized> MethodEntry<R> {
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn call(&self, registry: &R, request: &Message) -> Option<Message> {
        self.handler.call(registry, request)
    }

    fn matches(&self, interface: &str, method: &str) -> bool {
        self.interface == interface && self.method == method
    }
}

/// Ordered handler table, filled once and read-only afterwards.
pub struct MethodTable<R: ?Sized> {
    entries: Vec<MethodEntry<R>>,
}

impl<R: ?Sized> Default for MethodTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ?Sized> MethodTable<R> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a handler. A second handler for the same pair is rejected so
    /// lookups never depend on table order.
    pub fn register<F>(
        &mut self,
        interface: &str,
        method: &str,
        handler: F,
    ) -> Result<(), TableError>
    where
        F: MethodHandler<R> + 'static,
    {
        if self.lookup(interface, method).is_some() {
            return Err(TableError::Duplicate {
                interface: interface.to_string(),
                method: method.to_string(),
            });
        }

        self.entries.push(MethodEntry {
            interface: interface.to_string(),
            method: method.to_string(),
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// First entry whose interface and method both match exactly.
    pub fn lookup(&self, interface: &str, method: &str) -> Option<&MethodEntry<R>> {
        self.entries
            .iter()
            .find(|entry| entry.matches(interface, method))
    }

    pub fn entries(&self) -> impl Iterator<Item = &MethodEntry<R>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
