//! Request extractors for caller identity and locale.

pub mod caller;
pub mod locale;
pub use caller::CurrentCaller;
pub use locale::RequestLocale;
