//! Site content — slides, blogs, resume entries and the rest of the admin-managed collections.

pub mod model;
pub mod routes;

pub use model::{ContentInput, ContentItem, ContentKind};
pub use routes::{ContentRouteState, admin_content_routes, content_routes};
