//! Engine settings from environment variables, with defaults.

/// Default rows per list page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Upper bound for `limit` / `page_size` query parameters.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct AdminSettings {
    /// Mount point of UI mode (`ADMIN_BASE_PATH`).
    pub base_path: String,
    /// Mount point of API mode (`ADMIN_API_BASE_PATH`).
    pub api_base_path: String,
    /// Locale used when the request names none (`ADMIN_DEFAULT_LOCALE`).
    pub default_locale: String,
    pub page_size: u32,
    pub max_page_size: u32,
    /// Request body limit in bytes (`ADMIN_BODY_LIMIT`).
    pub body_limit: usize,
}

impl Default for AdminSettings {
    fn default() -> Self {
        AdminSettings {
            base_path: "/admin".into(),
            api_base_path: "/api/admin".into(),
            default_locale: "en".into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            body_limit: 1024 * 1024,
        }
    }
}

impl AdminSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable numbers keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AdminSettings::default();
        let number = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        };
        let max_page_size = number("ADMIN_MAX_PAGE_SIZE", defaults.max_page_size);
        AdminSettings {
            base_path: lookup("ADMIN_BASE_PATH")
                .map(|p| normalize_path(&p))
                .unwrap_or(defaults.base_path),
            api_base_path: lookup("ADMIN_API_BASE_PATH")
                .map(|p| normalize_path(&p))
                .unwrap_or(defaults.api_base_path),
            default_locale: lookup("ADMIN_DEFAULT_LOCALE").unwrap_or(defaults.default_locale),
            page_size: number("ADMIN_PAGE_SIZE", defaults.page_size).min(max_page_size),
            max_page_size,
            body_limit: lookup("ADMIN_BODY_LIMIT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.body_limit),
        }
    }
}

/// Leading slash, no trailing slash.
fn normalize_path(p: &str) -> String {
    let trimmed = p.trim().trim_matches('/');
    format!("/{}", trimmed)
}
