//! Repository layer: one submodule per entity, grounded on the `sqlx`
//! query/transaction idiom used by the reference control-plane handler
//! (`FOR UPDATE` row locking, `RETURNING *`, explicit `.begin()`
//! transactions) rather than an ORM.

pub mod activity;
pub mod bot;
pub mod guest;
pub mod registry;
pub mod tenant;
