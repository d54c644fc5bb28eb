//! Polling throttle policy.
//!
//! The rules for when the polling fallback should stay quiet are UX
//! driven, not correctness driven: skip while the client reports itself
//! hidden, and skip while heavy media playback is active for the project
//! so a status poll never interrupts the viewing experience. Keeping them
//! in one policy object makes the rules testable apart from the
//! transport.

use std::collections::HashMap;
use std::sync::RwLock;

use fsight_models::ProjectId;

#[derive(Debug, Clone, Copy)]
struct ClientActivity {
    visible: bool,
    heavy_playback: bool,
}

impl Default for ClientActivity {
    fn default() -> Self {
        Self {
            visible: true,
            heavy_playback: false,
        }
    }
}

/// Per-project polling throttle.
///
/// Projects without reported activity are polled; signals only ever make
/// polling quieter.
pub struct ThrottlePolicy {
    states: RwLock<HashMap<ProjectId, ClientActivity>>,
}

impl ThrottlePolicy {
    /// Create a policy with no activity reported yet.
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Record whether the project's client is currently visible.
    pub fn set_visible(&self, project_id: &ProjectId, visible: bool) {
        let mut states = self.states.write().expect("throttle map poisoned");
        states.entry(project_id.clone()).or_default().visible = visible;
    }

    /// Record whether heavy media playback is active for the project.
    pub fn set_heavy_playback(&self, project_id: &ProjectId, active: bool) {
        let mut states = self.states.write().expect("throttle map poisoned");
        states.entry(project_id.clone()).or_default().heavy_playback = active;
    }

    /// Decide whether the poller may run a tick for this project.
    pub fn should_poll(&self, project_id: &ProjectId) -> bool {
        let states = self.states.read().expect("throttle map poisoned");
        match states.get(project_id) {
            Some(activity) => activity.visible && !activity.heavy_playback,
            None => true,
        }
    }

    /// Forget a project's activity state.
    pub fn clear(&self, project_id: &ProjectId) {
        let mut states = self.states.write().expect("throttle map poisoned");
        states.remove(project_id);
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_project_is_polled() {
        let policy = ThrottlePolicy::new();
        assert!(policy.should_poll(&ProjectId::from_string("p1")));
    }

    #[test]
    fn test_hidden_client_skips_polling() {
        let policy = ThrottlePolicy::new();
        let project = ProjectId::from_string("p1");

        policy.set_visible(&project, false);
        assert!(!policy.should_poll(&project));

        policy.set_visible(&project, true);
        assert!(policy.should_poll(&project));
    }

    #[test]
    fn test_heavy_playback_skips_polling() {
        let policy = ThrottlePolicy::new();
        let project = ProjectId::from_string("p1");

        policy.set_heavy_playback(&project, true);
        assert!(!policy.should_poll(&project));

        policy.set_heavy_playback(&project, false);
        assert!(policy.should_poll(&project));
    }

    #[test]
    fn test_clear_restores_default() {
        let policy = ThrottlePolicy::new();
        let project = ProjectId::from_string("p1");

        policy.set_visible(&project, false);
        policy.clear(&project);
        assert!(policy.should_poll(&project));
    }
}
