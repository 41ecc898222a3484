//! Viewport observation for mounted scene containers.
//!
//! The hub plays the role of an intersection observer: it knows the current
//! viewport and a set of observed target rects, and re-evaluates them only
//! when either changes. A target counts as visible once `threshold` of its
//! area lies inside the viewport grown by `root_margin`, so content wakes up
//! slightly before it scrolls into view.
//!
//! Observation is a scoped resource. `VisibilityHub::observe` hands out a
//! `VisibilityGate` guard; dropping the guard releases the observation and all
//! of its subscribers, whichever way the owner goes away. Subscribers are
//! notified only on genuine enter/exit edges.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.area() <= 0.0
    }

    /// Grow by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return Rect::EMPTY;
        }
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObserverOptions {
    /// Pixels the viewport is grown by before testing intersection.
    pub root_margin: f32,
    /// Fraction of the target that must be inside to count as visible.
    pub threshold: f32,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin: 50.0,
            threshold: 0.1,
        }
    }
}

impl ObserverOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !self.root_margin.is_finite() || self.root_margin < 0.0 {
            return Err(format!(
                "visibility.root_margin must be a non-negative number, got {}",
                self.root_margin
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "visibility.threshold must be in [0, 1], got {}",
                self.threshold
            ));
        }
        Ok(())
    }
}

/// Visibility of `target` against `viewport` under `options`.
pub fn is_intersecting(viewport: &Rect, target: &Rect, options: &ObserverOptions) -> bool {
    if viewport.is_empty() {
        return false;
    }
    let root = viewport.expand(options.root_margin);
    if target.is_empty() {
        return root.contains_point(target.x, target.y);
    }
    let ratio = root.intersection(target).area() / target.area();
    ratio > 0.0 && ratio >= options.threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(bool)>;

struct Observation {
    target: Rect,
    visible: bool,
    transitions: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

struct HubState {
    options: ObserverOptions,
    viewport: Rect,
    observations: HashMap<u64, Observation>,
    next_id: u64,
}

struct HubShared {
    state: RefCell<HubState>,
    /// Gates dropped while the state was borrowed (from inside a listener).
    deferred_release: RefCell<Vec<u64>>,
}

impl HubShared {
    fn flush_deferred(&self) {
        let ids: Vec<u64> = self.deferred_release.borrow_mut().drain(..).collect();
        if ids.is_empty() {
            return;
        }
        let mut state = self.state.borrow_mut();
        for id in ids {
            state.observations.remove(&id);
        }
    }
}

/// Shared viewport observer. Cheap to clone; all clones observe the same
/// viewport.
#[derive(Clone)]
pub struct VisibilityHub {
    shared: Rc<HubShared>,
}

impl VisibilityHub {
    pub fn new(options: ObserverOptions, viewport: Rect) -> Self {
        Self {
            shared: Rc::new(HubShared {
                state: RefCell::new(HubState {
                    options,
                    viewport,
                    observations: HashMap::new(),
                    next_id: 0,
                }),
                deferred_release: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn viewport(&self) -> Rect {
        self.shared.state.borrow().viewport
    }

    pub fn options(&self) -> ObserverOptions {
        self.shared.state.borrow().options
    }

    /// Move or resize the viewport. An empty rect hides every target.
    pub fn set_viewport(&self, viewport: Rect) {
        self.shared.flush_deferred();
        let changed = {
            let mut state = self.shared.state.borrow_mut();
            if state.viewport == viewport {
                return;
            }
            state.viewport = viewport;
            reevaluate(&mut state, None)
        };
        dispatch(&self.shared, changed);
    }

    pub fn set_options(&self, options: ObserverOptions) {
        self.shared.flush_deferred();
        let changed = {
            let mut state = self.shared.state.borrow_mut();
            if state.options == options {
                return;
            }
            state.options = options;
            reevaluate(&mut state, None)
        };
        dispatch(&self.shared, changed);
    }

    /// Start observing `target`. The returned guard owns the observation.
    pub fn observe(&self, target: Rect) -> VisibilityGate {
        self.shared.flush_deferred();
        let mut state = self.shared.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let visible = is_intersecting(&state.viewport, &target, &state.options);
        state.observations.insert(
            id,
            Observation {
                target,
                visible,
                transitions: 0,
                listeners: Vec::new(),
            },
        );
        log::trace!("Observing target {id} at {target:?} (visible: {visible})");
        VisibilityGate {
            hub: Rc::downgrade(&self.shared),
            id,
        }
    }

    /// Number of live observations.
    pub fn observation_count(&self) -> usize {
        self.shared.flush_deferred();
        self.shared.state.borrow().observations.len()
    }
}

/// Recompute visibility; returns the observations whose state flipped.
fn reevaluate(state: &mut HubState, only: Option<u64>) -> Vec<(u64, bool)> {
    let HubState {
        options,
        viewport,
        observations,
        ..
    } = state;
    let mut changed = Vec::new();
    for (&id, observation) in observations.iter_mut() {
        if only.is_some_and(|only| only != id) {
            continue;
        }
        let visible = is_intersecting(viewport, &observation.target, options);
        if visible != observation.visible {
            observation.visible = visible;
            observation.transitions += 1;
            changed.push((id, visible));
        }
    }
    changed
}

/// Run listeners without holding the state borrow, so they may call back
/// into the hub.
fn dispatch(shared: &HubShared, changed: Vec<(u64, bool)>) {
    for (id, visible) in changed {
        let mut listeners = match shared.state.borrow_mut().observations.get_mut(&id) {
            Some(observation) => std::mem::take(&mut observation.listeners),
            None => continue,
        };
        for (_, listener) in listeners.iter_mut() {
            listener(visible);
        }
        if let Some(observation) = shared.state.borrow_mut().observations.get_mut(&id) {
            // Listeners added during dispatch were pushed onto the empty vec.
            listeners.append(&mut observation.listeners);
            observation.listeners = listeners;
        }
    }
    shared.flush_deferred();
}

/// Live visibility of one observed container. Dropping it stops observing.
pub struct VisibilityGate {
    hub: Weak<HubShared>,
    id: u64,
}

impl VisibilityGate {
    fn with_observation<R>(&self, f: impl FnOnce(&mut Observation) -> R) -> Option<R> {
        let shared = self.hub.upgrade()?;
        let mut state = shared.state.borrow_mut();
        let observation = state.observations.get_mut(&self.id)?;
        Some(f(observation))
    }

    /// `false` once the hub is gone.
    pub fn is_visible(&self) -> bool {
        self.with_observation(|o| o.visible).unwrap_or(false)
    }

    /// Number of enter/exit edges seen so far.
    pub fn transitions(&self) -> u64 {
        self.with_observation(|o| o.transitions).unwrap_or(0)
    }

    /// The container moved or resized.
    pub fn set_target_rect(&self, target: Rect) {
        let Some(shared) = self.hub.upgrade() else {
            return;
        };
        let changed = {
            let mut state = shared.state.borrow_mut();
            match state.observations.get_mut(&self.id) {
                Some(observation) if observation.target != target => observation.target = target,
                _ => return,
            }
            reevaluate(&mut state, Some(self.id))
        };
        dispatch(&shared, changed);
    }

    /// Register an edge callback. It receives the new visibility.
    pub fn subscribe(&self, listener: impl FnMut(bool) + 'static) -> SubscriptionId {
        let Some(shared) = self.hub.upgrade() else {
            return SubscriptionId(u64::MAX);
        };
        let mut state = shared.state.borrow_mut();
        let sub_id = SubscriptionId(state.next_id);
        state.next_id += 1;
        if let Some(observation) = state.observations.get_mut(&self.id) {
            observation.listeners.push((sub_id, Box::new(listener)));
        }
        sub_id
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.with_observation(|o| {
            let before = o.listeners.len();
            o.listeners.retain(|(id, _)| *id != subscription);
            o.listeners.len() != before
        })
        .unwrap_or(false)
    }
}

impl Drop for VisibilityGate {
    fn drop(&mut self) {
        let Some(shared) = self.hub.upgrade() else {
            return;
        };
        match shared.state.try_borrow_mut() {
            Ok(mut state) => {
                state.observations.remove(&self.id);
            }
            Err(_) => shared.deferred_release.borrow_mut().push(self.id),
        }
        log::trace!("Released observation {}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    fn hub() -> VisibilityHub {
        VisibilityHub::new(ObserverOptions::default(), VIEWPORT)
    }

    #[test]
    fn target_inside_viewport_is_visible() {
        let hub = hub();
        let gate = hub.observe(Rect::new(100.0, 100.0, 200.0, 200.0));
        assert!(gate.is_visible());
    }

    #[test]
    fn target_within_root_margin_is_visible_before_entering() {
        let hub = hub();
        // Starts 30px below the viewport, inside the 50px margin.
        let gate = hub.observe(Rect::new(0.0, 630.0, 800.0, 100.0));
        assert!(gate.is_visible());

        let far = hub.observe(Rect::new(0.0, 700.0, 800.0, 100.0));
        assert!(!far.is_visible());
    }

    #[test]
    fn partial_visibility_uses_threshold() {
        let options = ObserverOptions {
            root_margin: 0.0,
            threshold: 0.1,
        };
        let hub = VisibilityHub::new(options, VIEWPORT);
        // 5% inside.
        let gate = hub.observe(Rect::new(0.0, 590.0, 800.0, 200.0));
        assert!(!gate.is_visible());
        // 15% inside.
        gate.set_target_rect(Rect::new(0.0, 570.0, 800.0, 200.0));
        assert!(gate.is_visible());
    }

    #[test]
    fn toggles_once_per_genuine_edge() {
        let hub = hub();
        let gate = hub.observe(Rect::new(0.0, 1000.0, 800.0, 600.0));
        let edges = Rc::new(Cell::new(0));
        let seen = edges.clone();
        gate.subscribe(move |_| seen.set(seen.get() + 1));

        // Scroll down into the container.
        hub.set_viewport(Rect::new(0.0, 900.0, 800.0, 600.0));
        assert!(gate.is_visible());
        // Small scrolls while stationary inside do not re-toggle.
        for y in [910.0, 920.0, 930.0, 920.0] {
            hub.set_viewport(Rect::new(0.0, y, 800.0, 600.0));
        }
        assert_eq!(edges.get(), 1);

        // Scroll back up past it.
        hub.set_viewport(VIEWPORT);
        assert!(!gate.is_visible());
        assert_eq!(edges.get(), 2);
        assert_eq!(gate.transitions(), 2);
    }

    #[test]
    fn repeated_identical_viewport_does_not_notify() {
        let hub = hub();
        let gate = hub.observe(Rect::new(0.0, 0.0, 100.0, 100.0));
        let edges = Rc::new(Cell::new(0));
        let seen = edges.clone();
        gate.subscribe(move |_| seen.set(seen.get() + 1));
        for _ in 0..10 {
            hub.set_viewport(VIEWPORT);
        }
        assert_eq!(edges.get(), 0);
    }

    #[test]
    fn empty_viewport_hides_everything() {
        let hub = hub();
        let gate = hub.observe(VIEWPORT);
        hub.set_viewport(Rect::EMPTY);
        assert!(!gate.is_visible());
        hub.set_viewport(VIEWPORT);
        assert!(gate.is_visible());
    }

    #[test]
    fn dropping_gate_releases_observation_and_listeners() {
        let hub = hub();
        let calls = Rc::new(Cell::new(0));
        {
            let gate = hub.observe(VIEWPORT);
            let seen = calls.clone();
            gate.subscribe(move |_| seen.set(seen.get() + 1));
            assert_eq!(hub.observation_count(), 1);
        }
        assert_eq!(hub.observation_count(), 0);
        hub.set_viewport(Rect::EMPTY);
        assert_eq!(calls.get(), 0);
        // Only the closure clone held by the test remains.
        assert_eq!(Rc::strong_count(&calls), 1);
    }

    #[test]
    fn gate_is_released_on_early_return() {
        fn failing_mount(hub: &VisibilityHub) -> Result<VisibilityGate, String> {
            let gate = hub.observe(VIEWPORT);
            if gate.is_visible() {
                return Err("asset failed".to_string());
            }
            Ok(gate)
        }
        let hub = hub();
        assert!(failing_mount(&hub).is_err());
        assert_eq!(hub.observation_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let hub = hub();
        let gate = hub.observe(VIEWPORT);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let id = gate.subscribe(move |_| seen.set(seen.get() + 1));
        assert!(gate.unsubscribe(id));
        assert!(!gate.unsubscribe(id));
        hub.set_viewport(Rect::EMPTY);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn listener_may_call_back_into_hub() {
        let hub = hub();
        let gate = hub.observe(VIEWPORT);
        let inner_hub = hub.clone();
        let observed = Rc::new(Cell::new(usize::MAX));
        let seen = observed.clone();
        gate.subscribe(move |_| seen.set(inner_hub.observation_count()));
        hub.set_viewport(Rect::EMPTY);
        assert_eq!(observed.get(), 1);
    }

    #[test]
    fn gate_outliving_hub_reports_hidden() {
        let gate = {
            let hub = hub();
            hub.observe(VIEWPORT)
        };
        assert!(!gate.is_visible());
        assert_eq!(gate.transitions(), 0);
    }

    #[test]
    fn zero_area_target_uses_containment() {
        let hub = hub();
        let inside = hub.observe(Rect::new(10.0, 10.0, 0.0, 0.0));
        let outside = hub.observe(Rect::new(10.0, 900.0, 0.0, 0.0));
        assert!(inside.is_visible());
        assert!(!outside.is_visible());
    }

    #[test]
    fn options_validation() {
        assert!(ObserverOptions::default().validate().is_ok());
        let bad = ObserverOptions {
            root_margin: 0.0,
            threshold: 1.5,
        };
        assert!(bad.validate().is_err());
    }
}
