//! Observer registration and navigation progress tracking

use glam::{DVec2, Vec2};

use crate::provider::{CameraParams, RouteData};

/// A route as handed over by the navigation layer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavigationRoute {
    /// Longitude/latitude pairs in travel order
    pub waypoints: Vec<DVec2>,
}

/// A progress notification from the navigation layer
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProgress {
    pub route: NavigationRoute,
    pub arrived_at_waypoint: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArEvent {
    CameraUpdated(CameraParams),
    /// Arrow geometry for this tick, `None` when no lane is tracked
    LaneUpdated(Option<RouteData>),
    RouteUpdated(NavigationRoute),
    ArrivedAtDestination,
    /// Upcoming maneuver in view coordinates, `None` when off screen or unknown
    ManeuverLocationUpdated(Option<Vec2>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ArEvent)>;

/// Calls subscribers in registration order
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Vec<(SubscriptionId, Callback)>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&ArEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn dispatch(&mut self, event: &ArEvent) {
        for (_, callback) in &mut self.subscribers {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Turns progress notifications into at-most-once route updates.
///
/// The route is re-announced on the first progress after construction, after
/// a reroute, or after arriving at a waypoint.
#[derive(Debug, Clone)]
pub struct NavigationTracker {
    route: Option<NavigationRoute>,
    route_has_changed: bool,
}

impl Default for NavigationTracker {
    fn default() -> Self {
        Self {
            route: None,
            route_has_changed: true,
        }
    }
}

impl NavigationTracker {
    pub fn new(route: Option<NavigationRoute>) -> Self {
        Self {
            route,
            ..Default::default()
        }
    }

    pub fn route(&self) -> Option<&NavigationRoute> {
        self.route.as_ref()
    }

    /// Announce the current route to a newly attached observer.
    pub fn attach(&self, dispatcher: &mut EventDispatcher) {
        if let Some(route) = &self.route {
            dispatcher.dispatch(&ArEvent::RouteUpdated(route.clone()));
        }
    }

    pub fn on_progress(&mut self, progress: &RouteProgress, dispatcher: &mut EventDispatcher) {
        self.route = Some(progress.route.clone());

        if self.route_has_changed {
            self.route_has_changed = false;
            dispatcher.dispatch(&ArEvent::RouteUpdated(progress.route.clone()));
        }

        if progress.arrived_at_waypoint {
            self.route_has_changed = true;
            log::info!("Arrived at destination");
            dispatcher.dispatch(&ArEvent::ArrivedAtDestination);
        }
    }

    pub fn on_reroute(&mut self) {
        self.route_has_changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(dispatcher: &mut EventDispatcher) -> Rc<RefCell<Vec<ArEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        dispatcher.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    fn progress(arrived: bool) -> RouteProgress {
        RouteProgress {
            route: NavigationRoute {
                waypoints: vec![DVec2::new(27.56, 53.9), DVec2::new(27.57, 53.91)],
            },
            arrived_at_waypoint: arrived,
        }
    }

    #[test]
    fn subscribers_run_in_order_until_removed() {
        let mut dispatcher = EventDispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&order), Rc::clone(&order));
        let first = dispatcher.subscribe(move |_| a.borrow_mut().push(1));
        dispatcher.subscribe(move |_| b.borrow_mut().push(2));

        dispatcher.dispatch(&ArEvent::ArrivedAtDestination);
        assert!(dispatcher.unsubscribe(first));
        assert!(!dispatcher.unsubscribe(first));
        dispatcher.dispatch(&ArEvent::ArrivedAtDestination);

        assert_eq!(*order.borrow(), vec![1, 2, 2]);
    }

    #[test]
    fn route_is_announced_once_per_change() {
        let mut dispatcher = EventDispatcher::new();
        let events = recorder(&mut dispatcher);
        let mut tracker = NavigationTracker::default();

        tracker.on_progress(&progress(false), &mut dispatcher);
        tracker.on_progress(&progress(false), &mut dispatcher);
        assert_eq!(events.borrow().len(), 1);
        assert!(matches!(events.borrow()[0], ArEvent::RouteUpdated(_)));

        tracker.on_reroute();
        tracker.on_progress(&progress(false), &mut dispatcher);
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn arrival_rearms_route_announcement() {
        let mut dispatcher = EventDispatcher::new();
        let events = recorder(&mut dispatcher);
        let mut tracker = NavigationTracker::default();

        tracker.on_progress(&progress(true), &mut dispatcher);
        tracker.on_progress(&progress(false), &mut dispatcher);

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ArEvent::RouteUpdated(_)));
        assert_eq!(events[1], ArEvent::ArrivedAtDestination);
        assert!(matches!(events[2], ArEvent::RouteUpdated(_)));
    }

    #[test]
    fn attach_announces_known_route() {
        let mut dispatcher = EventDispatcher::new();
        let events = recorder(&mut dispatcher);
        NavigationTracker::default().attach(&mut dispatcher);
        assert!(events.borrow().is_empty());
        NavigationTracker::new(Some(progress(false).route)).attach(&mut dispatcher);
        assert_eq!(events.borrow().len(), 1);
    }
}
