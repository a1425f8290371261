use crate::view::ViewId;

/// State-changing event forwarded between the views of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    CursorMoved,
    CameraPlane,
    TransformApplied,
    VisibilityChanged,
    OpacityChanged,
    CropBoxChanged,
    RegistrationBoxChanged,
}

/// Publish/subscribe relay between the views of one session.
///
/// Delivery is synchronous, in view-registration order, and always with the
/// broadcast flag lowered on the receiving side, so no cycle can
/// re-broadcast. Views must be unregistered before they are torn down.
#[derive(Debug, Default)]
pub struct SyncBus {
    order: Vec<ViewId>,
}

impl SyncBus {
    pub fn register(&mut self, id: ViewId) {
        if !self.order.contains(&id) {
            self.order.push(id);
        }
    }

    pub fn unregister(&mut self, id: ViewId) {
        self.order.retain(|member| *member != id);
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.order.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Delivery targets for an event published by `origin`: every other
    /// registered view, in registration order, exactly once.
    pub fn fanout(&self, origin: ViewId) -> Vec<ViewId> {
        self.order
            .iter()
            .copied()
            .filter(|member| *member != origin)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_excludes_the_origin() {
        let mut bus = SyncBus::default();
        let ids: Vec<ViewId> = (0..4).map(ViewId::new).collect();
        for &id in &ids {
            bus.register(id);
        }
        let targets = bus.fanout(ids[1]);
        assert_eq!(targets, vec![ids[0], ids[2], ids[3]]);
        // each other member exactly once
        for &id in &ids[..1] {
            assert_eq!(targets.iter().filter(|t| **t == id).count(), 1);
        }
    }

    #[test]
    fn double_registration_is_ignored() {
        let mut bus = SyncBus::default();
        let id = ViewId::new(7);
        bus.register(id);
        bus.register(id);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn unregister_removes_the_view() {
        let mut bus = SyncBus::default();
        let a = ViewId::new(0);
        let b = ViewId::new(1);
        bus.register(a);
        bus.register(b);
        bus.unregister(a);
        assert!(!bus.contains(a));
        assert_eq!(bus.fanout(b), Vec::<ViewId>::new());
    }
}
