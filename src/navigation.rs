use crate::models::{MenuEntry, Role};

/// Icon
///
/// Icon references understood by the frontend icon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Home,
    QrCode,
    Calendar,
    FileText,
    Upload,
    ClipboardCheck,
    Users,
    Package,
    BarChart3,
    Settings,
}

impl Icon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Icon::Home => "home",
            Icon::QrCode => "qr-code",
            Icon::Calendar => "calendar",
            Icon::FileText => "file-text",
            Icon::Upload => "upload",
            Icon::ClipboardCheck => "clipboard-check",
            Icon::Users => "users",
            Icon::Package => "package",
            Icon::BarChart3 => "bar-chart-3",
            Icon::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
    pub icon: Icon,
}

const fn item(label: &'static str, path: &'static str, icon: Icon) -> NavItem {
    NavItem { label, path, icon }
}

pub const PRAKTIKAN_MENU: &[NavItem] = &[
    item("Beranda", "/beranda", Icon::Home),
    item("Absensi", "/absensi", Icon::QrCode),
    item("Jadwal Saya", "/jadwal", Icon::Calendar),
    item("Unduh Modul", "/modul", Icon::FileText),
    item("Upload Laporan", "/upload-laporan", Icon::Upload),
];

pub const ASISTEN_MENU: &[NavItem] = &[
    item("Beranda", "/beranda", Icon::Home),
    item("Input Nilai", "/input-nilai", Icon::ClipboardCheck),
    item("Validasi Absensi", "/validasi-absensi", Icon::QrCode),
    item("Jadwal Jaga", "/jadwal-jaga", Icon::Calendar),
    item("Inventaris", "/inventaris", Icon::Package),
];

pub const KOORDINATOR_MENU: &[NavItem] = &[
    item("Beranda", "/beranda", Icon::Home),
    item("Manajemen User", "/manajemen-user", Icon::Users),
    item("Laporan Keuangan", "/laporan-keuangan", Icon::BarChart3),
    item("Approval Jadwal", "/approval-jadwal", Icon::Calendar),
    item("Inventaris", "/inventaris", Icon::Package),
    item("Pengaturan", "/pengaturan", Icon::Settings),
];

/// menu_for
///
/// The ordered menu of a role. A missing role gets the lowest-privilege menu;
/// every target is still re-checked by the route guard.
pub fn menu_for(role: Option<Role>) -> &'static [NavItem] {
    match role {
        Some(Role::Praktikan) | None => PRAKTIKAN_MENU,
        Some(Role::Asisten) => ASISTEN_MENU,
        Some(Role::Koordinator) => KOORDINATOR_MENU,
    }
}

/// Index of the entry whose path equals `current_path` exactly.
pub fn active_index(current_path: &str, menu: &[NavItem]) -> Option<usize> {
    menu.iter().position(|item| item.path == current_path)
}

pub fn compose(role: Option<Role>, current_path: &str) -> Vec<MenuEntry> {
    let menu = menu_for(role);
    let active = active_index(current_path, menu);
    menu.iter()
        .enumerate()
        .map(|(index, item)| MenuEntry {
            label: item.label.to_string(),
            path: item.path.to_string(),
            icon: item.icon.as_str().to_string(),
            active: active == Some(index),
        })
        .collect()
}

pub fn role_label(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Praktikan) => "Praktikan",
        Some(Role::Asisten) => "Asisten",
        Some(Role::Koordinator) => "Koordinator",
        None => "Pengguna",
    }
}

/// First two characters of the e-mail, upper-cased; "U" when empty.
pub fn user_initials(email: &str) -> String {
    let initials: String = email.chars().take(2).collect::<String>().to_uppercase();
    if initials.is_empty() {
        "U".to_string()
    } else {
        initials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_role_falls_back_to_praktikan_menu() {
        assert_eq!(menu_for(None), PRAKTIKAN_MENU);
    }

    #[test]
    fn test_each_role_menu_starts_at_landing() {
        for role in Role::ALL {
            assert_eq!(menu_for(Some(role))[0].path, "/beranda");
        }
    }

    #[test]
    fn test_active_item_is_exact_match() {
        let menu = menu_for(Some(Role::Asisten));
        assert_eq!(active_index("/jadwal-jaga", menu), Some(3));
        assert_eq!(active_index("/jadwal-jaga/", menu), None);
        assert_eq!(active_index("/jadwal", menu), None);

        let entries = compose(Some(Role::Asisten), "/inventaris");
        let active: Vec<_> = entries.iter().filter(|e| e.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].label, "Inventaris");
        assert_eq!(active[0].icon, "package");
    }

    #[test]
    fn test_koordinator_menu_order() {
        let labels: Vec<_> = menu_for(Some(Role::Koordinator))
            .iter()
            .map(|item| item.label)
            .collect();
        assert_eq!(
            labels,
            [
                "Beranda",
                "Manajemen User",
                "Laporan Keuangan",
                "Approval Jadwal",
                "Inventaris",
                "Pengaturan"
            ]
        );
    }

    #[test]
    fn test_labels_and_initials() {
        assert_eq!(role_label(None), "Pengguna");
        assert_eq!(role_label(Some(Role::Koordinator)), "Koordinator");
        assert_eq!(user_initials("andi@lab.ac.id"), "AN");
        assert_eq!(user_initials(""), "U");
    }
}
