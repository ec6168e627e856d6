//! The event dispatch loop: routes watch events to per-resource diff state
//! and writes rendered diffs.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Write;

use tokio_util::sync::CancellationToken;

use crate::diff::{DiffRenderer, ResourceDiffState};
use crate::error::WatchDiffError;
use crate::events::{ResourceIdentity, ResourceMeta, WatchEvent, WatchEventType};
use crate::locator::{ensure_single_kind, ResourceLocator, INITIAL_RESOURCE_VERSION};
use crate::normalize::Normalizer;
use crate::watcher::EventStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Cancellation requested while an event was being handled.
    Draining,
    Stopped,
}

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Exhausted,
}

/// Owns the identity registry and the output sinks for one run.
///
/// Events are handled strictly in delivery order from a single task, so the
/// registry needs no locking.
pub struct Dispatcher<W, E> {
    registry: HashMap<ResourceIdentity, ResourceDiffState>,
    normalizer: Normalizer,
    renderer: DiffRenderer,
    out: W,
    err: E,
    state: LoopState,
}

impl<W: Write, E: Write> Dispatcher<W, E> {
    pub fn new(normalizer: Normalizer, renderer: DiffRenderer, out: W, err: E) -> Self {
        Self {
            registry: HashMap::new(),
            normalizer,
            renderer,
            out,
            err,
            state: LoopState::Stopped,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of resources currently tracked.
    pub fn tracked(&self) -> usize {
        self.registry.len()
    }

    pub fn is_tracking(&self, uid: &ResourceIdentity) -> bool {
        self.registry.contains_key(uid)
    }

    pub fn get(&self, uid: &ResourceIdentity) -> Option<&ResourceDiffState> {
        self.registry.get(uid)
    }

    pub fn into_sinks(self) -> (W, E) {
        (self.out, self.err)
    }

    /// Consume `stream` until it ends, fails, or `token` is cancelled.
    ///
    /// Cancellation is observed between events; an event already being
    /// handled is finished first.
    pub async fn run(
        &mut self,
        stream: &mut EventStream,
        token: &CancellationToken,
    ) -> Result<StopReason, WatchDiffError> {
        self.transition(LoopState::Running);
        let result = self.pump(stream, token).await;
        self.transition(LoopState::Stopped);
        result
    }

    async fn pump(
        &mut self,
        stream: &mut EventStream,
        token: &CancellationToken,
    ) -> Result<StopReason, WatchDiffError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StopReason::Cancelled),
                next = stream.next() => next,
            };

            let Some(event) = next else {
                tracing::debug!("watch stream exhausted");
                return Ok(StopReason::Exhausted);
            };
            self.handle_event(event?)?;

            if token.is_cancelled() {
                self.transition(LoopState::Draining);
            }
        }
    }

    /// Handle a single event.
    pub fn handle_event(&mut self, event: WatchEvent) -> Result<(), WatchDiffError> {
        match event.kind {
            WatchEventType::Error => {
                writeln!(self.err, "{}", event.object)?;
                self.err.flush()?;
                return Err(WatchDiffError::ServerError {
                    message: event.error_message(),
                });
            }
            WatchEventType::Bookmark => {
                tracing::debug!("skipping bookmark event");
                return Ok(());
            }
            _ => {}
        }

        let meta = ResourceMeta::from_object(&event.object)?;

        let state = match self.registry.entry(meta.uid.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!(
                    api_version = %meta.gvk.api_version(),
                    kind = %meta.gvk.kind,
                    namespace = %meta.namespace.as_deref().unwrap_or_default(),
                    name = %meta.name,
                    rv = %meta.resource_version,
                    "start watching diff of resource"
                );
                entry.insert(ResourceDiffState::from_meta(&meta))
            }
        };

        let diff = state.observe(
            &meta.resource_version,
            event.object,
            &self.normalizer,
            self.renderer.generator(),
        )?;

        if let Some(diff) = diff {
            let lines = self.renderer.render(&diff);
            if !lines.is_empty() {
                DiffRenderer::write_lines(&mut self.out, &lines)?;
            }
        }

        if event.kind == WatchEventType::Deleted {
            self.registry.remove(&meta.uid);
            tracing::debug!(uid = %meta.uid, name = %meta.name, "resource deleted, forgetting it");
        }
        Ok(())
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            tracing::debug!("dispatch loop {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Resolve the selection, check it names a single kind, subscribe from the
/// initial resource version and dispatch until cancelled or failed.
pub async fn watch_diff<L, W, E>(
    locator: &L,
    dispatcher: &mut Dispatcher<W, E>,
    token: &CancellationToken,
) -> Result<(), WatchDiffError>
where
    L: ResourceLocator + ?Sized,
    W: Write,
    E: Write,
{
    let kinds = locator.resolve()?;
    ensure_single_kind(&kinds)?;

    let mut stream = locator.watch(INITIAL_RESOURCE_VERSION)?;
    let reason = dispatcher.run(&mut stream, token).await?;
    finish(reason, locator, token)
}

fn finish<L>(reason: StopReason, locator: &L, token: &CancellationToken) -> Result<(), WatchDiffError>
where
    L: ResourceLocator + ?Sized,
{
    match reason {
        StopReason::Cancelled => Ok(()),
        // The subscription can close while an interrupt is still being delivered.
        StopReason::Exhausted if token.is_cancelled() => Ok(()),
        StopReason::Exhausted if locator.closed_stream_is_error() => Err(WatchDiffError::WatchClosed),
        StopReason::Exhausted => Ok(()),
    }
}
