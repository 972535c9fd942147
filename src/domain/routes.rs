//! Navigation table mapping URL-style paths to views.
//!
//! Views are identified here and only rendered by the presentation layer
//! once their route becomes active.

/// Identifier of a top-level view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Dashboard,
    Viewer,
    Segmentation,
    Settings,
}

/// A single entry of the navigation table.
#[derive(Debug, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub name: &'static str,
    pub view: View,
}

/// All routes, in navigation order. Names are unique.
pub static ROUTES: [Route; 4] = [
    Route { path: "/", name: "Dashboard", view: View::Dashboard },
    Route { path: "/viewer", name: "Viewer", view: View::Viewer },
    Route { path: "/segmentation", name: "Segmentation", view: View::Segmentation },
    Route { path: "/settings", name: "Settings", view: View::Settings },
];

/// Exact-match lookup. Unmatched paths resolve to nothing.
pub fn resolve(path: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.path == path)
}

pub fn by_name(name: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.name == name)
}

impl Route {
    pub fn home() -> &'static Route {
        &ROUTES[0]
    }

    pub fn for_view(view: View) -> &'static Route {
        match view {
            View::Dashboard => &ROUTES[0],
            View::Viewer => &ROUTES[1],
            View::Segmentation => &ROUTES[2],
            View::Settings => &ROUTES[3],
        }
    }

    pub fn index(&self) -> usize {
        ROUTES.iter().position(|route| route == self).unwrap_or(0)
    }

    pub fn next(&self) -> &'static Route {
        &ROUTES[(self.index() + 1) % ROUTES.len()]
    }

    pub fn previous(&self) -> &'static Route {
        &ROUTES[(self.index() + ROUTES.len() - 1) % ROUTES.len()]
    }
}
