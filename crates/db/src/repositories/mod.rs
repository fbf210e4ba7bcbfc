//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. Mutations that touch an envelope balance run the row
//! change and the balance delta in one database transaction.

pub mod account;
pub mod category;
pub mod envelope;
pub mod keyword_rule;
pub mod transaction;
pub mod user;

pub use account::{AccountError, AccountRepository, CreateAccountInput};
pub use category::{CategoryError, CategoryRepository, UNCATEGORIZED};
pub use envelope::{EnvelopeError, EnvelopeRepository};
pub use keyword_rule::{KeywordRuleError, KeywordRuleRepository, SaveRuleInput};
pub use transaction::{
    NewTransactionInput, PostedUpdateInput, SplitChildInput, TransactionError,
    TransactionRepository,
};
pub use user::{UserError, UserRepository};
