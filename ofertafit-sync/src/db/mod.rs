//! Database access for the sync engine
//!
//! Query modules over the shared schema bootstrapped by
//! `ofertafit_common::db`. Tracked-item mutations all flow through
//! [`items::apply_update`] so the update-policy decision is the only thing
//! that ever touches price fields.

pub mod catalog;
pub mod items;
pub mod runs;
pub mod settings;
