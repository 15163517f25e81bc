//! Host runtime seam: timers and local task spawning.
//!
//! The browser build implements this on top of `setTimeout` and the
//! microtask queue; tests implement it on a tokio `LocalSet`.

use std::time::Duration;

use futures::future::LocalBoxFuture;

pub trait Runtime {
    /// A future that resolves once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Run `task` to completion in the background on the current thread.
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
}
