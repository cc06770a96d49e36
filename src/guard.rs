use crate::{error::AuthorizationError, models::Role, session::Session};

/// Public entry path (login view).
pub const PUBLIC_ENTRY: &str = "/";
/// Default landing path for any signed-in role.
pub const LANDING: &str = "/beranda";
/// The report submission page.
pub const UPLOAD_LAPORAN: &str = "/upload-laporan";

const STAFF: &[Role] = &[Role::Asisten, Role::Koordinator];
const KOORDINATOR_ONLY: &[Role] = &[Role::Koordinator];
const PRAKTIKAN_ONLY: &[Role] = &[Role::Praktikan];

/// RouteSpec
///
/// Static access policy of one dashboard path. `allowed: None` admits any
/// authenticated role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub path: &'static str,
    pub title: &'static str,
    pub allowed: Option<&'static [Role]>,
}

impl RouteSpec {
    const fn open(path: &'static str, title: &'static str) -> Self {
        Self {
            path,
            title,
            allowed: None,
        }
    }

    const fn only(path: &'static str, title: &'static str, roles: &'static [Role]) -> Self {
        Self {
            path,
            title,
            allowed: Some(roles),
        }
    }

    pub fn admits(&self, role: Option<Role>) -> bool {
        match self.allowed {
            None => true,
            Some(roles) => role.is_some_and(|role| roles.contains(&role)),
        }
    }
}

/// The protected dashboard paths, defined once at startup.
pub const ROUTES: &[RouteSpec] = &[
    RouteSpec::open(LANDING, "Beranda"),
    RouteSpec::only(UPLOAD_LAPORAN, "Upload Laporan", PRAKTIKAN_ONLY),
    RouteSpec::open("/absensi", "Absensi"),
    RouteSpec::open("/jadwal", "Jadwal Saya"),
    RouteSpec::open("/modul", "Unduh Modul"),
    RouteSpec::only("/input-nilai", "Input Nilai", STAFF),
    RouteSpec::only("/validasi-absensi", "Validasi Absensi", STAFF),
    RouteSpec::only("/jadwal-jaga", "Jadwal Jaga", STAFF),
    RouteSpec::only("/inventaris", "Inventaris", STAFF),
    RouteSpec::only("/manajemen-user", "Manajemen User", KOORDINATOR_ONLY),
    RouteSpec::only("/laporan-keuangan", "Laporan Keuangan", KOORDINATOR_ONLY),
    RouteSpec::only("/approval-jadwal", "Approval Jadwal", KOORDINATOR_ONLY),
    RouteSpec::only("/pengaturan", "Pengaturan", KOORDINATOR_ONLY),
];

pub fn route_spec(path: &str) -> Option<&'static RouteSpec> {
    ROUTES.iter().find(|spec| spec.path == path)
}

/// GuardState
///
/// Outcome of one navigation attempt against a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Session still restoring: show a waiting indicator, never redirect.
    Checking,
    DeniedUnauthenticated,
    DeniedWrongRole,
    Allowed,
}

impl GuardState {
    pub fn redirect_target(&self) -> Option<&'static str> {
        self.into_result().err().map(|denial| denial.redirect_target())
    }

    /// `Ok(true)` when allowed, `Ok(false)` while checking.
    pub fn into_result(self) -> Result<bool, AuthorizationError> {
        match self {
            GuardState::Allowed => Ok(true),
            GuardState::Checking => Ok(false),
            GuardState::DeniedUnauthenticated => Err(AuthorizationError::Unauthenticated),
            GuardState::DeniedWrongRole => Err(AuthorizationError::WrongRole),
        }
    }
}

/// evaluate
///
/// Decides a protected navigation. Evaluated afresh on every navigation; the
/// unauthenticated check always runs before the role check, so a signed-out
/// visitor is sent to the public entry even for role-restricted paths. A
/// signed-in identity without a role never passes a role restriction.
pub fn evaluate(spec: &RouteSpec, session: &Session) -> GuardState {
    match session {
        Session::Loading => GuardState::Checking,
        Session::Absent => GuardState::DeniedUnauthenticated,
        Session::Present(active) => {
            if spec.admits(active.role) {
                GuardState::Allowed
            } else {
                GuardState::DeniedWrongRole
            }
        }
    }
}

/// Navigation
///
/// What to do with a requested path, across the public entry, the protected
/// routes and the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Wait,
    Redirect(&'static str),
    RenderEntry,
    Render(&'static RouteSpec),
    NotFound,
}

pub fn navigate(path: &str, session: &Session) -> Navigation {
    if path == PUBLIC_ENTRY {
        // A signed-in user has nothing to do on the login view.
        return match session {
            Session::Loading => Navigation::Wait,
            Session::Absent => Navigation::RenderEntry,
            Session::Present(_) => Navigation::Redirect(LANDING),
        };
    }

    let Some(spec) = route_spec(path) else {
        return Navigation::NotFound;
    };

    let state = evaluate(spec, session);
    match state.redirect_target() {
        Some(target) => {
            tracing::debug!(path, target, ?state, "navigation redirected");
            Navigation::Redirect(target)
        }
        None if state == GuardState::Checking => Navigation::Wait,
        None => Navigation::Render(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_unique() {
        for (i, spec) in ROUTES.iter().enumerate() {
            assert!(
                ROUTES[i + 1..].iter().all(|other| other.path != spec.path),
                "duplicate route {}",
                spec.path
            );
        }
    }

    #[test]
    fn test_redirect_targets() {
        assert_eq!(
            GuardState::DeniedUnauthenticated.redirect_target(),
            Some(PUBLIC_ENTRY)
        );
        assert_eq!(GuardState::DeniedWrongRole.redirect_target(), Some(LANDING));
        assert_eq!(GuardState::Checking.redirect_target(), None);
        assert_eq!(GuardState::Allowed.redirect_target(), None);
    }

    #[test]
    fn test_loading_never_redirects() {
        for spec in ROUTES {
            assert_eq!(evaluate(spec, &Session::Loading), GuardState::Checking);
        }
        assert_eq!(navigate(PUBLIC_ENTRY, &Session::Loading), Navigation::Wait);
    }

    #[test]
    fn test_unauthenticated_wins_over_role_mismatch() {
        let spec = route_spec("/pengaturan").expect("route exists");
        assert_eq!(
            evaluate(spec, &Session::Absent),
            GuardState::DeniedUnauthenticated
        );
        assert_eq!(
            navigate("/pengaturan", &Session::Absent),
            Navigation::Redirect(PUBLIC_ENTRY)
        );
    }

    #[test]
    fn test_unknown_path_is_not_found_for_everyone() {
        assert_eq!(navigate("/tidak-ada", &Session::Absent), Navigation::NotFound);
        assert_eq!(navigate("/tidak-ada", &Session::Loading), Navigation::NotFound);
    }

    #[test]
    fn test_route_admits() {
        let staff = route_spec("/inventaris").expect("route exists");
        assert!(staff.admits(Some(Role::Asisten)));
        assert!(staff.admits(Some(Role::Koordinator)));
        assert!(!staff.admits(Some(Role::Praktikan)));
        assert!(!staff.admits(None));

        let open = route_spec(LANDING).expect("route exists");
        assert!(open.admits(None));
    }
}
