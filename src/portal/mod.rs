//! Portal shell: navigation, theme, and role dashboards.

pub mod dashboard;
pub mod navigation;
pub mod theme;

pub use dashboard::{DashboardView, build_dashboard};
pub use navigation::{NavLink, Role, nav_links, nav_links_for};
pub use theme::ThemePreference;
