//! `SeaORM` entity definitions.

pub mod accounts;
pub mod categories;
pub mod envelopes;
pub mod keyword_rules;
pub mod transactions;
pub mod users;
