use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// Error a listener may return to report that it failed to handle a message.
pub type ListenerError = Box<dyn StdError + Send + Sync + 'static>;

pub type ListenerResult = Result<(), ListenerError>;

type Callback<M> = dyn Fn(&M) -> ListenerResult + Send + Sync + 'static;

/// A subscriber callback.
///
/// Listeners are compared by identity: clones of one `Listener` are equal, two listeners
/// built from identical closures are not. Keep a clone around to remove it later.
pub struct Listener<M> {
    callback: Arc<Callback<M>>,
}

impl<M> Listener<M> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&M) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wrap a callback that cannot fail (it may still panic).
    pub fn infallible<F>(callback: F) -> Self
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        Self::new(move |message| {
            callback(message);
            Ok(())
        })
    }

    /// Whether both listeners are the same registration target.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    fn call(&self, message: &M) -> ListenerResult {
        (self.callback)(message)
    }
}

impl<M> Clone for Listener<M> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<M> fmt::Debug for Listener<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("callback", &Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Ordered set of subscribers that decoded messages fan out to.
///
/// Registration order is dispatch order. The same listener may be registered more than
/// once, in which case it is called once per registration.
pub struct ListenerRegistry<M> {
    listeners: RwLock<Vec<Listener<M>>>,
}

impl<M> Default for ListenerRegistry<M> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<M> fmt::Debug for ListenerRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl<M> ListenerRegistry<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener<M>) {
        self.write().push(listener);
    }

    /// Remove every registration of `listener`, returning how many were removed.
    ///
    /// Removing a listener that is not registered is a no-op.
    pub fn remove(&self, listener: &Listener<M>) -> usize {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|registered| !registered.ptr_eq(listener));
        before.saturating_sub(listeners.len())
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn contains(&self, listener: &Listener<M>) -> bool {
        self.read().iter().any(|registered| registered.ptr_eq(listener))
    }

    /// Call every registered listener with `message`, in registration order.
    ///
    /// A listener that returns an error or panics is logged and skipped; the remaining
    /// listeners are still called. Listeners may add or remove registrations while a
    /// dispatch is running. Additions take effect from the next message, and a listener
    /// removed mid-dispatch is not called afterwards.
    ///
    /// Returns the number of listeners that failed.
    pub fn dispatch(&self, message: &M) -> usize {
        // Iterate a snapshot so listeners can mutate the registry without deadlocking
        let snapshot = self.read().clone();
        let mut failures = 0_usize;

        for (index, listener) in snapshot.iter().enumerate() {
            if !self.contains(listener) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| listener.call(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures = failures.saturating_add(1);
                    tracing::error!(index, error = %e, "error in WebSocket listener");
                }
                Err(payload) => {
                    failures = failures.saturating_add(1);
                    tracing::error!(
                        index,
                        error = %panic_message(payload.as_ref()),
                        "error in WebSocket listener"
                    );
                }
            }
        }

        failures
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Listener<M>>> {
        // A poisoned lock only means a writer panicked; the Vec itself is always valid
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Listener<M>>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "listener panicked"
    }
}
