//! Width condition and viewport observation.
//!
//! The stacked table is shown while the viewport is at or below the
//! configured `maxWidth`. A [`WidthObserver`] reports whether a
//! [`MediaQuery`] currently matches and notifies subscribed listeners when the
//! match state changes. [`Viewport`] is the in-process implementation: hosts
//! that track a real viewport call [`Viewport::resize`] as it changes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::options::MaxWidth;

/// Viewport width standing in for an unbounded `maxWidth`.
pub const UNBOUNDED_WIDTH_PX: f32 = 100_000.0;

/// A `(max-width: ...)` media query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaQuery {
    max_width: MaxWidth,
}

impl MediaQuery {
    pub fn max_width(max_width: MaxWidth) -> Self {
        Self { max_width }
    }

    /// The threshold in CSS pixels.
    pub fn threshold_px(&self) -> f32 {
        self.max_width.to_px().unwrap_or(UNBOUNDED_WIDTH_PX)
    }

    /// True when a viewport `width_px` wide satisfies the query.
    pub fn matches(&self, width_px: f32) -> bool {
        match self.max_width {
            MaxWidth::Unbounded => true,
            MaxWidth::Length(_) => width_px <= self.threshold_px(),
        }
    }
}

impl fmt::Display for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_width {
            MaxWidth::Length(length) => write!(f, "(max-width: {})", length),
            MaxWidth::Unbounded => write!(f, "(max-width: {}px)", UNBOUNDED_WIDTH_PX),
        }
    }
}

/// Callback receiving the new match state.
pub type Listener = Box<dyn FnMut(bool)>;

/// Handle returned by [`WidthObserver::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Source of width-condition notifications.
pub trait WidthObserver {
    /// Whether `query` matches right now.
    fn matches(&self, query: &MediaQuery) -> bool;

    /// Register `listener` to be called whenever the match state of `query`
    /// changes.
    fn subscribe(&mut self, query: MediaQuery, listener: Listener) -> SubscriptionId;

    /// Stop notifying a listener. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId);
}

struct Subscription {
    query: MediaQuery,
    matched: bool,
    listener: Listener,
}

struct ViewportState {
    width_px: f32,
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    /// Subscriptions taken out of the map while their listeners run
    in_flight: BTreeSet<SubscriptionId>,
    /// In-flight subscriptions unsubscribed before they were put back
    cancelled: BTreeSet<SubscriptionId>,
}

/// An observable viewport width.
///
/// Cloning yields another handle to the same viewport, so one clone can be
/// handed to a [`Stacker`](crate::Stacker) while the host keeps another to
/// report resizes.
#[derive(Clone)]
pub struct Viewport {
    state: Rc<RefCell<ViewportState>>,
}

impl Viewport {
    pub fn new(width_px: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(ViewportState {
                width_px,
                next_id: 0,
                subscriptions: BTreeMap::new(),
                in_flight: BTreeSet::new(),
                cancelled: BTreeSet::new(),
            })),
        }
    }

    pub fn width(&self) -> f32 {
        self.state.borrow().width_px
    }

    pub fn subscription_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Change the width and notify listeners whose query flipped.
    ///
    /// Listeners run after the viewport state is released, so they may query
    /// the viewport or unsubscribe while handling the change. A listener
    /// unsubscribed during the dispatch is not notified again.
    pub fn resize(&self, width_px: f32) {
        let mut fired = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            state.width_px = width_px;
            let ids: Vec<SubscriptionId> = state.subscriptions.keys().copied().collect();
            for id in ids {
                if let Some(mut subscription) = state.subscriptions.remove(&id) {
                    let matched = subscription.query.matches(width_px);
                    if matched != subscription.matched {
                        subscription.matched = matched;
                        state.in_flight.insert(id);
                        fired.push((id, subscription));
                    } else {
                        state.subscriptions.insert(id, subscription);
                    }
                }
            }
        }

        debug!(
            "viewport resized to {}px, {} listener(s) notified",
            width_px,
            fired.len()
        );

        for (_, subscription) in fired.iter_mut() {
            (subscription.listener)(subscription.matched);
        }

        let mut state = self.state.borrow_mut();
        for (id, subscription) in fired {
            state.in_flight.remove(&id);
            if !state.cancelled.remove(&id) {
                state.subscriptions.insert(id, subscription);
            }
        }
    }
}

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Viewport")
            .field("width_px", &state.width_px)
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

impl WidthObserver for Viewport {
    fn matches(&self, query: &MediaQuery) -> bool {
        query.matches(self.width())
    }

    fn subscribe(&mut self, query: MediaQuery, listener: Listener) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        let matched = query.matches(state.width_px);
        state.subscriptions.insert(
            id,
            Subscription {
                query,
                matched,
                listener,
            },
        );
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        let mut state = self.state.borrow_mut();
        if state.subscriptions.remove(&id).is_none() && state.in_flight.contains(&id) {
            state.cancelled.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Length;

    fn recorder() -> (Rc<RefCell<Vec<bool>>>, Listener) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (seen, Box::new(move |matched| sink.borrow_mut().push(matched)))
    }

    #[test]
    fn test_media_query_matches() {
        let query = MediaQuery::max_width(MaxWidth::Length(Length::px(740.0)));
        assert!(query.matches(320.0));
        assert!(query.matches(740.0));
        assert!(!query.matches(741.0));
        assert_eq!(query.to_string(), "(max-width: 740px)");

        let em = MediaQuery::max_width(MaxWidth::Length(Length::em(40.0)));
        assert!(em.matches(640.0));
        assert!(!em.matches(641.0));

        let unbounded = MediaQuery::max_width(MaxWidth::Unbounded);
        assert!(unbounded.matches(1_000_000.0));
        assert_eq!(unbounded.to_string(), "(max-width: 100000px)");
    }

    #[test]
    fn test_resize_notifies_only_on_change() {
        let mut viewport = Viewport::new(1024.0);
        let query = MediaQuery::max_width(MaxWidth::default());
        let (seen, listener) = recorder();
        viewport.subscribe(query, listener);

        viewport.resize(900.0);
        viewport.resize(600.0);
        viewport.resize(500.0);
        viewport.resize(800.0);

        assert_eq!(*seen.borrow(), vec![true, false]);
        assert_eq!(viewport.width(), 800.0);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut viewport = Viewport::new(1024.0);
        let (seen, listener) = recorder();
        let id = viewport.subscribe(MediaQuery::max_width(MaxWidth::default()), listener);
        assert_eq!(viewport.subscription_count(), 1);

        viewport.unsubscribe(id);
        viewport.unsubscribe(id);
        viewport.resize(300.0);

        assert!(seen.borrow().is_empty());
        assert_eq!(viewport.subscription_count(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let viewport = Viewport::new(1024.0);
        let mut handle: Box<dyn WidthObserver> = Box::new(viewport.clone());
        let query = MediaQuery::max_width(MaxWidth::default());
        assert!(!handle.matches(&query));

        let (seen, listener) = recorder();
        handle.subscribe(query, listener);
        viewport.resize(700.0);

        assert!(handle.matches(&query));
        assert_eq!(*seen.borrow(), vec![true]);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let viewport = Viewport::new(1024.0);
        let calls = Rc::new(RefCell::new(0));
        let own_id = Rc::new(RefCell::new(None::<SubscriptionId>));

        let mut handle = viewport.clone();
        let (counter, slot) = (calls.clone(), own_id.clone());
        let mut inner = viewport.clone();
        let id = handle.subscribe(
            MediaQuery::max_width(MaxWidth::default()),
            Box::new(move |_| {
                *counter.borrow_mut() += 1;
                if let Some(id) = *slot.borrow() {
                    inner.unsubscribe(id);
                }
            }),
        );
        *own_id.borrow_mut() = Some(id);

        viewport.resize(500.0);
        assert_eq!(viewport.subscription_count(), 0);

        viewport.resize(1000.0);
        assert_eq!(*calls.borrow(), 1);
    }
}
