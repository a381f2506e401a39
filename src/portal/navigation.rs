//! Role-based navigation table.

use serde::Serialize;

pub use crate::db::UserRole as Role;

/// One navbar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavLink {
    #[serde(rename = "href")]
    pub path: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

const fn link(path: &'static str, label: &'static str, icon: &'static str) -> NavLink {
    NavLink { path, label, icon }
}

pub const HOME: NavLink = link("/", "Inicio", "Home");

const ADMIN: &[NavLink] = &[
    HOME,
    link("/admin/dashboard", "Dashboard", "BarChart2"),
    link("/admin/clients", "Clientes", "Users"),
    link("/admin/cases", "Casos", "Briefcase"),
    link("/admin/settings", "Configuración", "Settings"),
];

const LAWYER: &[NavLink] = &[
    HOME,
    link("/lawyer/dashboard", "Dashboard", "BarChart2"),
    link("/lawyer/cases", "Mis Casos", "Briefcase"),
    link("/lawyer/calendar", "Calendario", "Calendar"),
    link("/immigration-assistant", "Asistente", "HelpCircle"),
];

const PARALEGAL: &[NavLink] = &[
    HOME,
    link("/paralegal/dashboard", "Dashboard", "BarChart2"),
    link("/paralegal/documents", "Documentos", "FileText"),
    link("/paralegal/tasks", "Tareas", "CheckSquare"),
];

const CLIENT: &[NavLink] = &[
    HOME,
    link("/client/dashboard", "Dashboard", "BarChart2"),
    link("/client/cases", "Mis Casos", "Briefcase"),
    link("/document-scanner", "Documentos", "FileText"),
    link("/immigration-assistant", "Asistente", "HelpCircle"),
];

const DEFAULT: &[NavLink] = &[
    HOME,
    link("/dashboard", "Dashboard", "BarChart2"),
    link("/immigration-assistant", "Asistente", "HelpCircle"),
    link("/document-scanner", "Documentos", "FileText"),
    link("/login", "Iniciar Sesión", "User"),
];

/// Links for a role. `None` yields the anonymous/default set.
pub fn nav_links(role: Option<Role>) -> &'static [NavLink] {
    match role {
        Some(Role::Admin) => ADMIN,
        Some(Role::Lawyer) => LAWYER,
        Some(Role::Paralegal) => PARALEGAL,
        Some(Role::Client) => CLIENT,
        None => DEFAULT,
    }
}

/// Links for a raw role string. Unknown roles get the default set.
pub fn nav_links_for(raw: &str) -> &'static [NavLink] {
    nav_links(Role::parse_loose(raw))
}
