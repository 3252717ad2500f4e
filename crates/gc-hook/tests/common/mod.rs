//! Test Utilities for the gc-hook Test Suite
//!
//! Every fixture owns an isolated registry and handle table, so tests never
//! observe each other's registrations through the process-wide singletons.
//!
//! ============================================================================
//! These utilities assert exact counts: a callback fired twice or not at all
//! is a bug, never a timing tolerance.
//! ============================================================================

#![allow(dead_code)]

use gc_hook::logging::{LogLevel, LoggerConfig};
use gc_hook::{HandleTable, HookConfig, HookEvent, Registry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Maximum time to wait for background finalization
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// ============================================================================
/// HOOK FIXTURE
/// ============================================================================

/// Test fixture holding a private registry and handle table
pub struct HookFixture {
    pub registry: Arc<Registry>,
    pub handles: Arc<HandleTable>,
    pub config: HookConfig,
}

impl HookFixture {
    /// Create fixture recording every event
    ///
    /// **Bug this finds:** Events filtered out or missing from history
    pub fn new() -> Self {
        Self::with_config(HookConfig {
            logger: LoggerConfig {
                level: LogLevel::Trace,
                history: 4096,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Create fixture with custom configuration
    pub fn with_config(config: HookConfig) -> Self {
        config
            .validate()
            .expect("fixture configuration should be valid");

        Self {
            registry: Arc::new(Registry::from_config(&config)),
            handles: Arc::new(HandleTable::with_limit(config.handle_limit)),
            config,
        }
    }

    /// Run `turns` collection turns and return the callbacks fired
    ///
    /// **Bug this finds:** Callbacks lost between collect and run_pending
    pub fn turns(&self, turns: usize) -> usize {
        (0..turns).map(|_| self.registry.tick()).sum()
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<HookEvent> {
        self.registry.logger().events()
    }

    /// Labels of every `Released` event, in order
    pub fn released_labels(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HookEvent::Released { label, .. } => Some(label),
                _ => None,
            })
            .collect()
    }
}

impl Default for HookFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// ============================================================================
/// CALLBACK RECORDING
/// ============================================================================

/// Shared, ordered log of callback invocations
#[derive(Clone, Default)]
pub struct FireLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl FireLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback recording the held string it receives
    pub fn recorder(&self) -> impl FnOnce(Arc<String>) + Send + 'static {
        let entries = self.entries.clone();
        move |held: Arc<String>| entries.lock().push(held.as_str().to_string())
    }

    /// Callback recording a fixed name, whatever it receives
    pub fn named<H: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> impl FnOnce(Arc<H>) + Send + 'static {
        let entries = self.entries.clone();
        let name = name.to_string();
        move |_: Arc<H>| entries.lock().push(name)
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Entries sorted, for checks that do not depend on firing order
    pub fn sorted(&self) -> Vec<String> {
        let mut entries = self.entries();
        entries.sort();
        entries
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert that every name fired exactly once
///
/// **Bug this finds:** Double firing, lost callbacks
/// **Tolerance:** ZERO - each registration fires at most once
#[track_caller]
pub fn assert_fired_once(log: &FireLog, names: &[&str], context: &str) {
    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();

    assert_eq!(
        log.sorted(),
        expected,
        "{}: callbacks fired {:?}, expected each of {:?} exactly once",
        context,
        log.entries(),
        names
    );
}

/// Wait until `cond` holds or the timeout elapses
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Assert that operation completed within timeout
///
/// **Bug this finds:** Deadlock, a lock held while a callback runs
#[track_caller]
pub fn assert_completed_within_timeout<F, R>(operation: F, timeout: Duration, context: &str) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = operation();
    let elapsed = start.elapsed();

    assert!(
        elapsed < timeout,
        "{}: Operation took {:?}, exceeded timeout of {:?} - possible deadlock",
        context,
        elapsed,
        timeout
    );

    result
}

/// ============================================================================
/// CONCURRENT TEST HELPERS
/// ============================================================================

/// Run `work` on `thread_count` threads and collect their results
///
/// **Bug this finds:** Race conditions, thread safety issues
pub fn run_concurrently<F, R>(thread_count: usize, work: F) -> Vec<R>
where
    F: Fn(usize) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    let work = Arc::new(work);
    let handles: Vec<_> = (0..thread_count)
        .map(|thread_id| {
            let work = work.clone();
            thread::spawn(move || work(thread_id))
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|e| panic!("Thread panicked: {:?}", e))
        })
        .collect()
}
