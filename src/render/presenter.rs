//! Reader side of the world lock
//!
//! Each frame either shows a status banner or a scene whose entities were
//! copied under the world lock. When the lock stays busy the previous scene
//! is shown again.

use std::sync::Arc;
use std::time::Duration;

use crate::net::session::{ConnectionState, ViewerSession};
use crate::render::scene::{Scene, StatusBanner};
use crate::util::vec::Vector2i;

/// How long a frame waits for the world lock before reusing the last scene
pub const READER_LOCK_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View<'a> {
    Banner(StatusBanner),
    /// Captured this frame
    Fresh(&'a Scene),
    /// The lock was busy, this is the previous capture
    Stale(&'a Scene),
    /// The lock was busy and nothing was captured yet
    Skipped,
}

impl View<'_> {
    /// One-line description for logs
    pub fn describe(&self) -> String {
        match self {
            View::Banner(banner) => banner.to_string(),
            View::Fresh(scene) | View::Stale(scene) => scene.summary(),
            View::Skipped => "World busy.".to_string(),
        }
    }
}

pub struct Presenter {
    session: Arc<ViewerSession>,
    viewport: Vector2i,
    lock_timeout: Duration,
    last_scene: Option<Scene>,
}

impl Presenter {
    pub fn new(session: Arc<ViewerSession>, viewport: Vector2i) -> Self {
        Self {
            session,
            viewport,
            lock_timeout: READER_LOCK_TIMEOUT,
            last_scene: None,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn frame(&mut self) -> View<'_> {
        let state = self.session.state();
        if state != ConnectionState::Connected {
            if let Some(banner) = StatusBanner::for_state(state, false) {
                return View::Banner(banner);
            }
        }

        let captured = {
            let Some(world) = self.session.lock_world_for(self.lock_timeout) else {
                return match &self.last_scene {
                    Some(scene) => View::Stale(scene),
                    None => View::Skipped,
                };
            };
            world
                .as_ref()
                .map(|world| Scene::capture_entities(world, self.viewport))
        };

        match captured {
            Some(mut scene) => {
                scene.lay_out_grid();
                View::Fresh(self.last_scene.insert(scene))
            }
            None => {
                self.last_scene = None;
                View::Banner(StatusBanner::WorldNotLoaded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldSnapshot;

    fn connected_with_world() -> Arc<ViewerSession> {
        let session = Arc::new(ViewerSession::new(ConnectionState::Connected));
        *session.try_world().unwrap() = Some(WorldSnapshot::new(1000, None));
        session
    }

    #[test]
    fn test_banner_when_not_connected() {
        let session = Arc::new(ViewerSession::new(ConnectionState::NotConnected));
        let mut presenter = Presenter::new(session, Vector2i::splat(500));
        assert_eq!(presenter.frame(), View::Banner(StatusBanner::NotConnected));
    }

    #[test]
    fn test_banner_when_world_missing() {
        let session = Arc::new(ViewerSession::new(ConnectionState::Connected));
        let mut presenter = Presenter::new(session, Vector2i::splat(500));
        assert_eq!(presenter.frame(), View::Banner(StatusBanner::WorldNotLoaded));
    }

    #[test]
    fn test_fresh_scene() {
        let mut presenter = Presenter::new(connected_with_world(), Vector2i::splat(500));
        match presenter.frame() {
            View::Fresh(scene) => {
                assert!(scene.items.is_empty());
                assert_eq!(scene.grid.len(), 11 * 11);
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_busy_lock_reuses_previous_scene() {
        let session = connected_with_world();
        let mut presenter = Presenter::new(session.clone(), Vector2i::splat(500))
            .with_lock_timeout(Duration::from_millis(1));

        let guard = session.try_world().unwrap();
        assert_eq!(presenter.frame(), View::Skipped);
        drop(guard);

        let first = match presenter.frame() {
            View::Fresh(scene) => scene.clone(),
            other => panic!("unexpected view: {:?}", other),
        };

        let _guard = session.try_world().unwrap();
        assert_eq!(presenter.frame(), View::Stale(&first));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            View::Banner(StatusBanner::Reconnecting).describe(),
            "Reconnecting."
        );
        assert_eq!(View::Skipped.describe(), "World busy.");
    }
}
