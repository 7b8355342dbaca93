//! Fixed-size, self-healing engine pool
//!
//! A FIFO semaphore counts idle engines: every permit corresponds to exactly
//! one engine in the idle queue. Releasing a live engine pushes it back and
//! adds a permit, which the semaphore hands to the longest waiter. Releasing
//! a dead engine drops it and spawns a replacement in the background.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::{EngineFactory, UciEngine};
use crate::error::CoachError;

const REPLACEMENT_BACKOFF_START: Duration = Duration::from_millis(250);
const REPLACEMENT_BACKOFF_MAX: Duration = Duration::from_secs(30);

struct PoolInner<F: EngineFactory> {
    factory: F,
    size: usize,
    idle: Mutex<VecDeque<F::Engine>>,
    permits: Semaphore,
    next_id: AtomicUsize,
    closed: AtomicBool,
}

/// Cheap to clone; all clones share the same engines.
pub struct EnginePool<F: EngineFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: EngineFactory> Clone for EnginePool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: EngineFactory> EnginePool<F> {
    /// Spawn `size` engines. Fails if any of them fails to initialize; the
    /// ones already started are disposed.
    pub async fn new(factory: F, size: usize) -> Result<Self, CoachError> {
        let size = size.max(1);
        let mut engines = VecDeque::with_capacity(size);
        for id in 0..size {
            match factory.spawn(id).await {
                Ok(engine) => engines.push_back(engine),
                Err(e) => {
                    error!(engine_id = id, error = %e, "Engine failed to initialize");
                    for mut engine in engines {
                        engine.dispose().await;
                    }
                    return Err(e);
                }
            }
        }
        info!(size, "Engine pool ready");

        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                size,
                idle: Mutex::new(engines),
                permits: Semaphore::new(size),
                next_id: AtomicUsize::new(size),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Wait for an idle engine. Waiters are served in arrival order.
    pub async fn acquire(&self) -> Result<EngineLease<F>, CoachError> {
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| CoachError::PoolClosed)?;
        // The engine now belongs to the lease; the permit comes back with it.
        permit.forget();

        let engine = self.inner.idle.lock().pop_front();
        match engine {
            Some(engine) => Ok(EngineLease {
                engine: Some(engine),
                pool: Arc::clone(&self.inner),
            }),
            None => Err(CoachError::EngineRuntime(
                "engine pool permit without idle engine".into(),
            )),
        }
    }

    /// Return an engine explicitly. Dropping the lease does the same.
    pub fn release(&self, lease: EngineLease<F>) {
        drop(lease);
    }

    /// Configured number of engines.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Engines currently waiting for a caller.
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Reject new acquirers and dispose every idle engine. Leased engines are
    /// disposed when their lease is dropped.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.permits.close();
        let engines: Vec<F::Engine> = self.inner.idle.lock().drain(..).collect();
        for mut engine in engines {
            engine.dispose().await;
        }
        info!("Engine pool shut down");
    }
}

impl<F: EngineFactory> PoolInner<F> {
    fn give_back(self: &Arc<Self>, mut engine: F::Engine) {
        if self.closed.load(Ordering::Acquire) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { engine.dispose().await });
            }
            return;
        }

        if engine.is_alive() {
            self.idle.lock().push_back(engine);
            self.permits.add_permits(1);
        } else {
            warn!(engine_id = engine.id(), "Engine process exited; spawning replacement");
            drop(engine);
            self.spawn_replacement();
        }
    }

    fn spawn_replacement(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!("No runtime available to replace a dead engine; pool shrinks by one");
            return;
        };
        let pool = Arc::clone(self);
        handle.spawn(async move {
            let mut delay = REPLACEMENT_BACKOFF_START;
            loop {
                if pool.closed.load(Ordering::Acquire) {
                    return;
                }
                let id = pool.next_id.fetch_add(1, Ordering::Relaxed);
                match pool.factory.spawn(id).await {
                    Ok(mut engine) => {
                        if pool.closed.load(Ordering::Acquire) {
                            engine.dispose().await;
                            return;
                        }
                        info!(engine_id = id, "Replacement engine ready");
                        pool.idle.lock().push_back(engine);
                        pool.permits.add_permits(1);
                        return;
                    }
                    Err(e) => {
                        warn!(
                            engine_id = id,
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Replacement engine failed to start"
                        );
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(REPLACEMENT_BACKOFF_MAX);
                    }
                }
            }
        });
    }
}

/// Exclusive use of one pooled engine. Returned to the pool on drop.
pub struct EngineLease<F: EngineFactory> {
    engine: Option<F::Engine>,
    pool: Arc<PoolInner<F>>,
}

impl<F: EngineFactory> Deref for EngineLease<F> {
    type Target = F::Engine;

    fn deref(&self) -> &F::Engine {
        self.engine.as_ref().expect("lease holds its engine until dropped")
    }
}

impl<F: EngineFactory> DerefMut for EngineLease<F> {
    fn deref_mut(&mut self) -> &mut F::Engine {
        self.engine.as_mut().expect("lease holds its engine until dropped")
    }
}

impl<F: EngineFactory> Drop for EngineLease<F> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.give_back(engine);
        }
    }
}
