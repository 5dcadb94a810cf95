//! Shared application state.
//!
//! One explicit container replaces the ambient store a UI would otherwise
//! reach into. Every setter publishes exactly one [`StateChange`] to
//! subscribers, in the order the mutations happened.
//!
//! Uploads tag their writes with an attempt number handed out by
//! [`AppState::begin_attempt`]; writes from an attempt that is no longer
//! current are discarded, so at most one upload's effects ever land.

use crate::acquire::PreviewString;
use crate::upload::{ProductDetails, SearchResults};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiMode {
    #[default]
    Idle,
    Dragging,
    CameraActive,
    Uploading,
}

/// Point-in-time copy of everything a renderer needs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppSnapshot {
    pub mode: UiMode,
    pub image: Option<PreviewString>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub s3_url: Option<String>,
    pub product_details: Option<ProductDetails>,
    pub search_results: Option<SearchResults>,
    pub progress: Option<u8>,
    /// Result slots hold the fallback dataset rather than live results.
    pub degraded: bool,
}

impl AppSnapshot {
    /// Progress to draw, if any. Hidden once it reaches 100.
    pub fn progress_bar(&self) -> Option<u8> {
        self.progress.filter(|p| *p < 100)
    }

    pub fn has_results(&self) -> bool {
        self.product_details.is_some() && self.search_results.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Mode(UiMode),
    Image(bool),
    Loading(bool),
    Error(Option<String>),
    S3Url(Option<String>),
    ProductDetails,
    SearchResults,
    Progress(Option<u8>),
    Degraded(bool),
}

struct Inner {
    snapshot: AppSnapshot,
    attempt: u64,
}

/// Cloneable handle to the shared state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<Inner>>,
    changes: broadcast::Sender<StateChange>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                snapshot: AppSnapshot::default(),
                attempt: 0,
            })),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> AppSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn mode(&self) -> UiMode {
        self.inner.lock().snapshot.mode
    }

    /// Start a new attempt; earlier attempts can no longer commit.
    pub fn begin_attempt(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.attempt += 1;
        inner.attempt
    }

    #[cfg(test)]
    pub(crate) fn is_current(&self, attempt: u64) -> bool {
        self.inner.lock().attempt == attempt
    }

    /// Apply `f` atomically if `attempt` is still current.
    pub fn commit(&self, attempt: u64, f: impl FnOnce(&mut Transaction<'_>)) -> bool {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt {
            return false;
        }
        let mut tx = Transaction::new(&mut inner.snapshot);
        f(&mut tx);
        self.publish(tx.events);
        true
    }

    /// Advance simulated progress by `step`, holding at `ceiling`.
    ///
    /// Returns whether further ticks can still move the value.
    pub fn bump_progress(&self, attempt: u64, step: u8, ceiling: u8) -> bool {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt {
            return false;
        }
        let next = match inner.snapshot.progress {
            Some(p) if p >= ceiling => return false,
            Some(p) => p.saturating_add(step).min(ceiling),
            None => step.min(ceiling),
        };
        let mut tx = Transaction::new(&mut inner.snapshot);
        tx.set_progress(Some(next));
        self.publish(tx.events);
        next < ceiling
    }

    pub fn set_mode(&self, mode: UiMode) {
        self.update(|tx| tx.set_mode(mode));
    }

    pub fn set_image(&self, image: Option<PreviewString>) {
        self.update(|tx| tx.set_image(image));
    }

    pub fn set_loading(&self, loading: bool) {
        self.update(|tx| tx.set_loading(loading));
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|tx| tx.set_error(error));
    }

    pub fn set_s3_url(&self, url: Option<String>) {
        self.update(|tx| tx.set_s3_url(url));
    }

    pub fn set_product_details(&self, details: Option<ProductDetails>) {
        self.update(|tx| tx.set_product_details(details));
    }

    pub fn set_search_results(&self, results: Option<SearchResults>) {
        self.update(|tx| tx.set_search_results(results));
    }

    pub fn set_progress(&self, progress: Option<u8>) {
        self.update(|tx| tx.set_progress(progress));
    }

    fn update(&self, f: impl FnOnce(&mut Transaction<'_>)) {
        let mut inner = self.inner.lock();
        let mut tx = Transaction::new(&mut inner.snapshot);
        f(&mut tx);
        self.publish(tx.events);
    }

    // Called with the lock held so subscribers see mutations in order.
    fn publish(&self, events: Vec<StateChange>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.changes.send(event);
        }
    }
}

/// A batch of writes applied under one lock.
pub struct Transaction<'a> {
    snapshot: &'a mut AppSnapshot,
    events: Vec<StateChange>,
}

impl<'a> Transaction<'a> {
    fn new(snapshot: &'a mut AppSnapshot) -> Self {
        Self {
            snapshot,
            events: Vec::new(),
        }
    }

    pub fn set_mode(&mut self, mode: UiMode) {
        self.snapshot.mode = mode;
        self.events.push(StateChange::Mode(mode));
    }

    pub fn set_image(&mut self, image: Option<PreviewString>) {
        self.events.push(StateChange::Image(image.is_some()));
        self.snapshot.image = image;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.snapshot.is_loading = loading;
        self.events.push(StateChange::Loading(loading));
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.events.push(StateChange::Error(error.clone()));
        self.snapshot.error = error;
    }

    pub fn set_s3_url(&mut self, url: Option<String>) {
        self.events.push(StateChange::S3Url(url.clone()));
        self.snapshot.s3_url = url;
    }

    pub fn set_product_details(&mut self, details: Option<ProductDetails>) {
        self.snapshot.product_details = details;
        self.events.push(StateChange::ProductDetails);
    }

    pub fn set_search_results(&mut self, results: Option<SearchResults>) {
        self.snapshot.search_results = results;
        self.events.push(StateChange::SearchResults);
    }

    pub fn set_progress(&mut self, progress: Option<u8>) {
        self.snapshot.progress = progress;
        self.events.push(StateChange::Progress(progress));
    }

    pub fn set_degraded(&mut self, degraded: bool) {
        self.snapshot.degraded = degraded;
        self.events.push(StateChange::Degraded(degraded));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<StateChange>) -> Vec<StateChange> {
        let mut out = Vec::new();
        while let Ok(change) = rx.try_recv() {
            out.push(change);
        }
        out
    }

    #[test]
    fn every_setter_emits_one_change() {
        let state = AppState::new();
        let mut rx = state.subscribe();

        state.set_loading(true);
        state.set_error(Some("boom".into()));
        state.set_mode(UiMode::Uploading);
        state.set_loading(true);

        assert_eq!(
            drain(&mut rx),
            vec![
                StateChange::Loading(true),
                StateChange::Error(Some("boom".into())),
                StateChange::Mode(UiMode::Uploading),
                StateChange::Loading(true),
            ]
        );
        let snap = state.snapshot();
        assert!(snap.is_loading);
        assert_eq!(snap.error.as_deref(), Some("boom"));
    }

    #[test]
    fn stale_attempts_cannot_commit() {
        let state = AppState::new();
        let first = state.begin_attempt();
        let second = state.begin_attempt();

        assert!(!state.commit(first, |tx| tx.set_s3_url(Some("old".into()))));
        assert!(state.commit(second, |tx| tx.set_s3_url(Some("new".into()))));
        assert_eq!(state.snapshot().s3_url.as_deref(), Some("new"));
        assert!(!state.is_current(first));
    }

    #[test]
    fn progress_bumps_hold_at_ceiling() {
        let state = AppState::new();
        let attempt = state.begin_attempt();
        state.set_progress(Some(0));

        let mut seen = Vec::new();
        while state.bump_progress(attempt, 10, 90) {
            seen.push(state.snapshot().progress.unwrap());
        }
        seen.push(state.snapshot().progress.unwrap());
        assert_eq!(seen, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert!(!state.bump_progress(attempt, 10, 90));
        assert_eq!(state.snapshot().progress, Some(90));
    }

    #[test]
    fn progress_bump_ignores_other_attempts() {
        let state = AppState::new();
        let stale = state.begin_attempt();
        let _current = state.begin_attempt();
        state.set_progress(Some(0));
        assert!(!state.bump_progress(stale, 10, 90));
        assert_eq!(state.snapshot().progress, Some(0));
    }

    #[test]
    fn progress_bar_hides_at_completion() {
        let mut snap = AppSnapshot::default();
        assert_eq!(snap.progress_bar(), None);
        snap.progress = Some(40);
        assert_eq!(snap.progress_bar(), Some(40));
        snap.progress = Some(100);
        assert_eq!(snap.progress_bar(), None);
    }
}
