//! Termination sources a [`Director`](crate::Director) waits on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use edt_core::Token;

/// A pinned, boxed, `Send` future resolving once a [`Breaker`] has
/// tripped.
pub type WaitFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// An abstract termination source for a [`Director`](crate::Director)
/// run.
///
/// A `Breaker` is consulted exactly once per run:
/// [`Director::do_`](crate::Director::do_) spawns every action, then
/// awaits [`Breaker::wait`], then calls [`Breaker::release`] before
/// collecting results — never polled per-iteration.
pub trait Breaker: Send + Sync {
    /// The token actions spawned under this breaker should run with.
    /// Cancelling the breaker cancels this token.
    fn context(&self) -> Token;

    /// Release whatever resources `wait` was holding (signal handlers,
    /// derived tokens). Idempotent.
    fn release(&self);

    /// Resolve once the breaker has tripped.
    fn wait<'a>(&'a self) -> WaitFuture<'a>;
}

/// Trips when its own [`Token`] is cancelled, by a parent or explicitly.
pub struct ContextBreaker {
    token: Token,
}

impl ContextBreaker {
    /// Watch `token` for cancellation.
    #[must_use]
    pub fn new(token: Token) -> ContextBreaker {
        ContextBreaker { token }
    }
}

impl Breaker for ContextBreaker {
    fn context(&self) -> Token {
        self.token.clone()
    }

    fn release(&self) {}

    fn wait<'a>(&'a self) -> WaitFuture<'a> {
        Box::pin(self.token.cancelled())
    }
}

/// Trips on an OS interrupt or termination signal — SIGINT via
/// [`tokio::signal::ctrl_c`], SIGTERM via [`tokio::signal::unix`] on unix
/// targets — or when `parent` cancels, or when told to directly via
/// [`SignalBreaker::trip`].
pub struct SignalBreaker {
    token: Token,
}

impl SignalBreaker {
    /// Derive a child of `parent` and arm the signal listener.
    #[must_use]
    pub fn new(parent: Token) -> SignalBreaker {
        let token = parent.child();
        let watched = token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            let mut sigterm = tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )
            .expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("sigint received, tripping breaker");
                }
                #[cfg(unix)]
                _ = sigterm.recv() => {
                    tracing::info!("sigterm received, tripping breaker");
                }
                () = watched.cancelled() => {}
            }
            watched.cancel();
        });
        SignalBreaker { token }
    }

    /// Trip the breaker directly, without waiting for a signal.
    pub fn trip(&self) {
        self.token.cancel();
    }
}

impl Breaker for SignalBreaker {
    fn context(&self) -> Token {
        self.token.clone()
    }

    fn release(&self) {
        self.token.cancel();
    }

    fn wait<'a>(&'a self) -> WaitFuture<'a> {
        Box::pin(self.token.cancelled())
    }
}

/// A breaker satisfied by any of `breakers` tripping. Its context is the
/// first member's.
#[must_use]
pub fn any(breakers: Vec<Arc<dyn Breaker>>) -> Arc<dyn Breaker> {
    struct Any(Vec<Arc<dyn Breaker>>, Token);
    impl Breaker for Any {
        fn context(&self) -> Token {
            self.1.clone()
        }

        fn release(&self) {
            for b in &self.0 {
                b.release();
            }
        }

        fn wait<'a>(&'a self) -> WaitFuture<'a> {
            Box::pin(async move {
                let waits: Vec<_> = self.0.iter().map(|b| b.wait()).collect();
                futures::future::select_all(waits).await;
            })
        }
    }
    let context = breakers
        .first()
        .map_or_else(Token::background, |b| b.context());
    Arc::new(Any(breakers, context))
}
