use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use log::info;
use serde::{Deserialize, Serialize};

/// Screens the client can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scene {
    Login,
    Home,
    Explore,
}

impl Scene {
    pub fn name(self) -> &'static str {
        match self {
            Scene::Login => "login",
            Scene::Home => "home",
            Scene::Explore => "explore",
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scene {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "login" => Ok(Scene::Login),
            "home" => Ok(Scene::Home),
            "explore" => Ok(Scene::Explore),
            other => Err(format!("unknown scene '{other}'")),
        }
    }
}

/// Navigation sink. The client only asks to go somewhere; how a scene is
/// shown is the router's business.
pub trait SceneRouter: Send + Sync {
    fn navigate_to(&self, scene: Scene);
}

/// Router for headless use: logs each navigation and remembers where it went.
#[derive(Debug, Default)]
pub struct LogRouter {
    history: Mutex<Vec<Scene>>,
}

impl LogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent scene navigated to.
    pub fn current(&self) -> Option<Scene> {
        self.history
            .lock()
            .ok()
            .and_then(|history| history.last().copied())
    }

    /// Every navigation so far, oldest first.
    pub fn history(&self) -> Vec<Scene> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

impl SceneRouter for LogRouter {
    fn navigate_to(&self, scene: Scene) {
        info!("scene -> {}", scene);
        if let Ok(mut history) = self.history.lock() {
            history.push(scene);
        }
    }
}
