//! Page lifecycle and visibility tracking.
//!
//! The host feeds [`NativeEvent`]s into the page. They translate into bus
//! events only after the matching logical event has been subscribed, and
//! redundant teardown signals collapse into a single `page_unload`.

use beacon_events::VisibilityState;
use beacon_events::names;

/// Lifecycle signal delivered by the host environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeEvent {
    /// Window load finished.
    Load,
    /// DOM content parsed.
    DomContentLoaded,
    /// Document visibility changed.
    VisibilityChange(VisibilityState),
    /// Page is being hidden for navigation or bfcache.
    PageHide,
    /// Document is unloading.
    Unload,
    /// Browser asks whether the page may unload.
    BeforeUnload,
}

/// Which native listeners are attached and which one-shot events fired.
#[derive(Clone, Debug, Default)]
pub struct LifecycleTracker {
    load: bool,
    dom: bool,
    visibility: bool,
    unload: bool,
    before_unload: bool,
    ready_fired: bool,
    dom_fired: bool,
    torn_down: bool,
}

impl LifecycleTracker {
    /// Attach the native listeners backing a logical event on first subscribe.
    ///
    /// Returns `true` if a listener was newly attached.
    pub fn attach_for(&mut self, canonical: &str) -> bool {
        let flag = match canonical {
            names::PAGE_READY => &mut self.load,
            names::DOM_LOADED => &mut self.dom,
            names::VISIBILITY_CHANGED | names::PRERENDER_TO_VISIBLE => &mut self.visibility,
            names::PAGE_UNLOAD => &mut self.unload,
            names::BEFORE_UNLOAD => &mut self.before_unload,
            _ => return false,
        };
        let newly = !*flag;
        *flag = true;
        newly
    }

    /// Whether a native event has a listener attached.
    pub fn is_attached(&self, event: NativeEvent) -> bool {
        match event {
            NativeEvent::Load => self.load,
            NativeEvent::DomContentLoaded => self.dom,
            NativeEvent::VisibilityChange(_) => self.visibility,
            NativeEvent::PageHide | NativeEvent::Unload => self.unload,
            NativeEvent::BeforeUnload => self.before_unload,
        }
    }

    /// Latch `page_ready`. Returns `true` the first time only.
    pub fn latch_ready(&mut self) -> bool {
        !std::mem::replace(&mut self.ready_fired, true)
    }

    /// Whether `page_ready` has fired.
    pub fn is_ready(&self) -> bool {
        self.ready_fired
    }

    /// Latch `dom_loaded`. Returns `true` the first time only.
    pub fn latch_dom(&mut self) -> bool {
        !std::mem::replace(&mut self.dom_fired, true)
    }

    /// Latch teardown. Returns `true` for the first teardown signal only.
    pub fn latch_teardown(&mut self) -> bool {
        !std::mem::replace(&mut self.torn_down, true)
    }

    /// Whether teardown has started.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

/// Effect of a visibility change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Transition {
    /// The state actually changed.
    pub changed: bool,
    /// A prerendered page became visible for the first time.
    pub prerender_to_visible: bool,
}

/// Current visibility and the times of the last transitions.
#[derive(Clone, Debug)]
pub struct VisibilityTracker {
    state: VisibilityState,
    last_visible_ms: Option<u64>,
    last_hidden_ms: Option<u64>,
    was_prerendered: bool,
}

impl VisibilityTracker {
    /// Tracker for a page that started in `initial`.
    #[must_use]
    pub fn new(initial: VisibilityState) -> Self {
        Self {
            state: initial,
            last_visible_ms: (initial == VisibilityState::Visible).then_some(0),
            last_hidden_ms: (initial == VisibilityState::Hidden).then_some(0),
            was_prerendered: initial == VisibilityState::Prerender,
        }
    }

    /// Current state.
    pub fn state(&self) -> VisibilityState {
        self.state
    }

    /// Apply a change observed at `now_ms`.
    pub fn transition(&mut self, next: VisibilityState, now_ms: u64) -> Transition {
        if next == self.state {
            return Transition::default();
        }
        let from = std::mem::replace(&mut self.state, next);
        match next {
            VisibilityState::Visible => self.last_visible_ms = Some(now_ms),
            VisibilityState::Hidden => self.last_hidden_ms = Some(now_ms),
            VisibilityState::Prerender => {}
        }
        let prerender_to_visible = self.was_prerendered
            && from == VisibilityState::Prerender
            && next == VisibilityState::Visible;
        if prerender_to_visible {
            self.was_prerendered = false;
        }
        Transition {
            changed: true,
            prerender_to_visible,
        }
    }

    /// Milliseconds since the page was last visible.
    pub fn since_visible(&self, now_ms: u64) -> Option<u64> {
        self.last_visible_ms.map(|t| now_ms.saturating_sub(t))
    }

    /// Milliseconds since the page was last hidden.
    pub fn since_hidden(&self, now_ms: u64) -> Option<u64> {
        self.last_hidden_ms.map(|t| now_ms.saturating_sub(t))
    }
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new(VisibilityState::Visible)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_only_for_lifecycle_names() {
        let mut t = LifecycleTracker::default();
        assert!(!t.is_attached(NativeEvent::Load));
        assert!(t.attach_for(names::PAGE_READY));
        assert!(!t.attach_for(names::PAGE_READY));
        assert!(t.is_attached(NativeEvent::Load));
        assert!(!t.attach_for(names::BEACON));
    }

    #[test]
    fn unload_attachment_covers_pagehide() {
        let mut t = LifecycleTracker::default();
        let _ = t.attach_for(names::PAGE_UNLOAD);
        assert!(t.is_attached(NativeEvent::PageHide));
        assert!(t.is_attached(NativeEvent::Unload));
        assert!(!t.is_attached(NativeEvent::BeforeUnload));
    }

    #[test]
    fn latches_fire_once() {
        let mut t = LifecycleTracker::default();
        assert!(t.latch_teardown());
        assert!(!t.latch_teardown());
        assert!(t.latch_ready());
        assert!(!t.latch_ready());
        assert!(t.is_ready());
    }

    #[test]
    fn visibility_records_transition_times() {
        let mut v = VisibilityTracker::new(VisibilityState::Visible);
        assert_eq!(v.since_visible(100), Some(100));
        assert_eq!(v.since_hidden(100), None);
        let t = v.transition(VisibilityState::Hidden, 400);
        assert!(t.changed);
        assert!(!t.prerender_to_visible);
        assert_eq!(v.since_hidden(500), Some(100));
        assert_eq!(v.state(), VisibilityState::Hidden);
    }

    #[test]
    fn same_state_is_not_a_change() {
        let mut v = VisibilityTracker::default();
        assert_eq!(v.transition(VisibilityState::Visible, 10), Transition::default());
    }

    #[test]
    fn prerender_to_visible_once() {
        let mut v = VisibilityTracker::new(VisibilityState::Prerender);
        assert!(v.transition(VisibilityState::Visible, 50).prerender_to_visible);
        let _ = v.transition(VisibilityState::Hidden, 60);
        let again = v.transition(VisibilityState::Visible, 70);
        assert!(again.changed);
        assert!(!again.prerender_to_visible);
    }
}
