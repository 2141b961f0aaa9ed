//! Lead intake and contact messages.

pub mod model;
pub mod routes;

pub use model::{ContactMessage, ContactRequest, Lead, LeadSource, LeadStatus};
pub use routes::{LeadRouteState, admin_lead_routes, intake_routes};
