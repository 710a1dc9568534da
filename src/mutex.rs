use crate::engine::Scanner;
use crate::error::Error;

/// Common interface for mutex implementations.
///
/// The select lines, enable lines and the expander bus are shared hardware, so there must only
/// ever be a single scanning engine.  When that engine has to be reachable from more than one
/// place (a periodic task and a command handler, say), it is wrapped in a [`SharedScanner`] which
/// uses one of these mutexes.  `io-scanner` already implements this trait for a number of
/// existing mutex types.  Most of them are guarded by a feature that needs to be enabled.  Here is
/// an overview:
///
/// | Mutex | Feature Name | Notes |
/// | --- | --- | --- |
/// | [`core::cell::RefCell`] | _always available_ | For sharing within a single execution context. |
/// | [`std::sync::Mutex`][mutex-std] | `std` | For platforms where `std` is available. |
/// | [`critical_section::Mutex`][mutex-cs] | `critical-section` | Use critical-section to ensure synchronized access |
///
/// [mutex-std]: https://doc.rust-lang.org/std/sync/struct.Mutex.html
/// [mutex-cs]: https://docs.rs/critical-section/latest/critical_section/struct.Mutex.html
///
/// For other mutex types, a custom implementation is needed.  Due to the orphan rule, it might be
/// necessary to wrap it in a newtype.  As an example, this is what such a custom implementation
/// might look like:
///
/// ```
/// struct MyMutex<T>(std::sync::Mutex<T>);
///
/// impl<T> io_scanner::ScanMutex for MyMutex<T> {
///     type Inner = T;
///
///     fn create(v: T) -> Self {
///         Self(std::sync::Mutex::new(v))
///     }
///
///     fn lock<R, F: FnOnce(&mut Self::Inner) -> R>(&self, f: F) -> R {
///         let mut v = self.0.lock().unwrap();
///         f(&mut v)
///     }
/// }
/// ```
pub trait ScanMutex {
    /// The engine that is wrapped inside this mutex.
    type Inner;

    /// Create a new mutex of this type.
    fn create(v: Self::Inner) -> Self;

    /// Lock the mutex and give a closure access to the engine inside.
    fn lock<R, F: FnOnce(&mut Self::Inner) -> R>(&self, f: F) -> R;
}

impl<T> ScanMutex for core::cell::RefCell<T> {
    type Inner = T;

    fn create(v: Self::Inner) -> Self {
        core::cell::RefCell::new(v)
    }

    fn lock<R, F: FnOnce(&mut Self::Inner) -> R>(&self, f: F) -> R {
        let mut v = self.borrow_mut();
        f(&mut v)
    }
}

#[cfg(any(test, feature = "std"))]
impl<T> ScanMutex for std::sync::Mutex<T> {
    type Inner = T;

    fn create(v: Self::Inner) -> Self {
        std::sync::Mutex::new(v)
    }

    fn lock<R, F: FnOnce(&mut Self::Inner) -> R>(&self, f: F) -> R {
        // A sweep that panicked left the banks in whatever state the hardware is in; the next
        // sweep drives every line again, so the poison can be ignored.
        let mut v = self.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut v)
    }
}

#[cfg(feature = "critical-section")]
impl<T> ScanMutex for critical_section::Mutex<core::cell::RefCell<T>> {
    type Inner = T;

    fn create(v: Self::Inner) -> Self {
        critical_section::Mutex::new(core::cell::RefCell::new(v))
    }

    fn lock<R, F: FnOnce(&mut Self::Inner) -> R>(&self, f: F) -> R {
        critical_section::with(|cs| {
            let mut v = self.borrow(cs).borrow_mut();
            f(&mut v)
        })
    }
}

/// The single, shareable scanning engine of a system.
///
/// ```
/// # use io_scanner::{Scanner, ScanMutex, SharedScanner};
/// # struct Counter(u32);
/// # impl Scanner for Counter {
/// #     type Frame = u32;
/// #     fn scan(&mut self) -> Result<u32, io_scanner::Error> { self.0 += 1; Ok(self.0) }
/// # }
/// let shared: SharedScanner<core::cell::RefCell<Counter>> = SharedScanner::new(Counter(0));
/// let scanner = &shared;
/// assert_eq!(scanner.scan(), Ok(1));
/// assert_eq!(shared.scan(), Ok(2));
/// ```
pub struct SharedScanner<M>(M);

impl<M: ScanMutex> SharedScanner<M> {
    pub fn new(engine: M::Inner) -> Self {
        Self(M::create(engine))
    }

    /// Run `f` with exclusive access to the engine.
    pub fn lock<R, F: FnOnce(&mut M::Inner) -> R>(&self, f: F) -> R {
        self.0.lock(f)
    }

    /// Take the engine back out.
    pub fn into_inner(self) -> M {
        self.0
    }
}

impl<M> SharedScanner<M>
where
    M: ScanMutex,
    M::Inner: Scanner,
{
    /// Run one sweep while holding the lock.
    pub fn scan(&self) -> Result<<M::Inner as Scanner>::Frame, Error> {
        self.0.lock(|engine| engine.scan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl Scanner for Counter {
        type Frame = u32;

        fn scan(&mut self) -> Result<u32, Error> {
            self.0 += 1;
            Ok(self.0)
        }
    }

    #[test]
    fn refcell() {
        let shared: SharedScanner<core::cell::RefCell<Counter>> = SharedScanner::new(Counter(0));
        assert_eq!(shared.scan(), Ok(1));
        assert_eq!(shared.lock(|c| c.0), 1);
    }

    #[test]
    fn std_mutex_across_threads() {
        let shared: std::sync::Arc<SharedScanner<std::sync::Mutex<Counter>>> =
            std::sync::Arc::new(SharedScanner::new(Counter(0)));

        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        shared.scan().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.lock(|c| c.0), 40);
    }

    #[cfg(feature = "critical-section")]
    #[test]
    fn critical_section_mutex() {
        let shared: SharedScanner<critical_section::Mutex<core::cell::RefCell<Counter>>> =
            SharedScanner::new(Counter(0));
        assert_eq!(shared.scan(), Ok(1));
    }
}
