//! Overlay ownership for one map view.
//!
//! A session holds at most one attached overlay. Each search takes a
//! [`SearchTicket`] carrying the session generation at the time it began;
//! starting another search bumps the generation, and any later transition
//! or attach made with an older ticket is discarded.

use std::collections::HashMap;

use metrics::counter;
use serde::Serialize;
use solar_common::{GeoBounds, SolarError, SolarResult};
use tracing::{debug, info, warn};

use crate::overlay::RenderedOverlay;

/// Identifies an overlay attached to a map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OverlayHandle(pub u64);

/// A surface that displays georeferenced overlays.
pub trait MapView: Send {
    /// Display `overlay`. An error means the view could not load it.
    fn attach(&mut self, overlay: &RenderedOverlay) -> SolarResult<OverlayHandle>;

    /// Remove a previously attached overlay. Unknown handles are ignored.
    fn detach(&mut self, handle: OverlayHandle);
}

/// Progress of a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    Idle,
    Fetching,
    Decoding,
    Rendering,
    Simulating,
    Attached,
}

impl SearchState {
    pub fn can_transition_to(self, next: SearchState) -> bool {
        use SearchState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Decoding)
                | (Decoding, Rendering)
                | (Rendering, Attached)
                | (Simulating, Attached)
                | (Attached, Idle)
        ) || (next == Simulating && self != Simulating)
    }
}

/// Proof that a search was started, stamped with its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of [`OverlaySession::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached(OverlayHandle),
    /// A newer search started; nothing was attached.
    Stale { ticket: u64, current: u64 },
}

impl AttachOutcome {
    pub fn is_attached(&self) -> bool {
        matches!(self, AttachOutcome::Attached(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct AttachedOverlay {
    handle: OverlayHandle,
    kind: &'static str,
    bounds: GeoBounds,
}

/// Owns the single overlay slot of a map view.
pub struct OverlaySession<V: MapView> {
    view: V,
    generation: u64,
    state: SearchState,
    trail: Vec<SearchState>,
    current: Option<AttachedOverlay>,
}

impl<V: MapView> OverlaySession<V> {
    pub fn new(view: V) -> Self {
        Self {
            view,
            generation: 0,
            state: SearchState::Idle,
            trail: vec![SearchState::Idle],
            current: None,
        }
    }

    /// Start a new search, invalidating every earlier ticket.
    ///
    /// The previous overlay is detached and the state returns to `Idle`.
    pub fn begin_search(&mut self) -> SearchTicket {
        self.detach_current();
        self.generation += 1;
        self.state = SearchState::Idle;
        self.trail = vec![SearchState::Idle];
        debug!(generation = self.generation, "Search started");
        SearchTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Move the current search to `next`.
    ///
    /// Returns `false` without changing anything when the ticket is stale or
    /// the transition is not allowed from the current state.
    pub fn advance(&mut self, ticket: &SearchTicket, next: SearchState) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                next = ?next,
                "Ignoring transition from stale search"
            );
            return false;
        }
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "Rejected search state transition");
            return false;
        }
        self.state = next;
        self.trail.push(next);
        true
    }

    /// Detach the current overlay, then attach `overlay`.
    ///
    /// A stale ticket attaches nothing. If the view fails to load the
    /// overlay the error is returned and the slot stays empty.
    pub fn attach(&mut self, ticket: &SearchTicket, overlay: &RenderedOverlay) -> SolarResult<AttachOutcome> {
        if !self.is_current(ticket) {
            counter!("overlay_stale_discards_total").increment(1);
            info!(
                ticket = ticket.generation,
                current = self.generation,
                kind = overlay.kind(),
                "Discarding overlay from stale search"
            );
            return Ok(AttachOutcome::Stale {
                ticket: ticket.generation,
                current: self.generation,
            });
        }

        self.detach_current();
        let handle = self.view.attach(overlay)?;
        self.current = Some(AttachedOverlay {
            handle,
            kind: overlay.kind(),
            bounds: overlay.bounds,
        });

        if self.state != SearchState::Attached {
            self.state = SearchState::Attached;
            self.trail.push(SearchState::Attached);
        }
        info!(
            generation = self.generation,
            kind = overlay.kind(),
            handle = handle.0,
            "Overlay attached"
        );
        Ok(AttachOutcome::Attached(handle))
    }

    /// Remove the attached overlay, if any. Safe to call repeatedly.
    pub fn detach_current(&mut self) -> bool {
        match self.current.take() {
            Some(attached) => {
                self.view.detach(attached.handle);
                debug!(handle = attached.handle.0, kind = attached.kind, "Overlay detached");
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// States visited by the current search, starting at `Idle`.
    pub fn trail(&self) -> &[SearchState] {
        &self.trail
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_handle(&self) -> Option<OverlayHandle> {
        self.current.map(|c| c.handle)
    }

    pub fn current_kind(&self) -> Option<&'static str> {
        self.current.map(|c| c.kind)
    }

    pub fn current_bounds(&self) -> Option<GeoBounds> {
        self.current.map(|c| c.bounds)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(mut self) -> V {
        self.detach_current();
        self.view
    }
}

/// Headless map view that keeps overlays in memory.
///
/// Can be told to reject image overlays, which is how a real map behaves
/// when the overlay image URL fails to load.
#[derive(Debug, Default)]
pub struct MemoryMapView {
    next_handle: u64,
    overlays: HashMap<OverlayHandle, RenderedOverlay>,
    reject_images: bool,
    attach_calls: usize,
}

impl MemoryMapView {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view whose image loads always fail.
    pub fn rejecting_images() -> Self {
        Self {
            reject_images: true,
            ..Self::default()
        }
    }

    pub fn attached_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls
    }

    pub fn overlays(&self) -> impl Iterator<Item = &RenderedOverlay> {
        self.overlays.values()
    }
}

impl MapView for MemoryMapView {
    fn attach(&mut self, overlay: &RenderedOverlay) -> SolarResult<OverlayHandle> {
        self.attach_calls += 1;
        if self.reject_images && overlay.image().is_some() {
            return Err(SolarError::MapView("overlay image failed to load".to_string()));
        }
        self.next_handle += 1;
        let handle = OverlayHandle(self.next_handle);
        self.overlays.insert(handle, overlay.clone());
        Ok(handle)
    }

    fn detach(&mut self, handle: OverlayHandle) {
        self.overlays.remove(&handle);
    }
}
