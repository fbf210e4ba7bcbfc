//! Database seeder for Tally development and testing.
//!
//! Seeds a demo user with categories, envelopes, keyword rules, an
//! unlinked checking account, and a starter budget entry. Safe to re-run:
//! existing rows are reused instead of duplicated.
//!
//! Usage: cargo run --bin seeder

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use tally_db::repositories::{
    AccountRepository, CategoryRepository, CreateAccountInput, EnvelopeRepository,
    KeywordRuleRepository, SaveRuleInput, TransactionRepository, UserRepository,
};

const DEMO_EMAIL: &str = "demo@tally.local";
const DEMO_NAME: &str = "Demo User";
const DEMO_ACCOUNT: &str = "Checking";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = tally_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    let users = UserRepository::new(db.clone());
    let categories = CategoryRepository::new(db.clone());
    let envelopes = EnvelopeRepository::new(db.clone());
    let accounts = AccountRepository::new(db.clone());
    let rules = KeywordRuleRepository::new(db.clone());
    let transactions = TransactionRepository::new(db);

    println!("Seeding demo user...");
    let user = match users.find_by_email(DEMO_EMAIL).await.expect("user lookup") {
        Some(existing) => existing,
        None => users
            .create_user(DEMO_EMAIL, DEMO_NAME)
            .await
            .expect("Failed to create demo user"),
    };

    println!("Seeding categories and envelopes...");
    let monthly = find_or_create_category(&categories, user.id, "Monthly Bills").await;
    let everyday = find_or_create_category(&categories, user.id, "Everyday").await;

    let rent = find_or_create_envelope(&envelopes, user.id, monthly, "Rent").await;
    let utilities = find_or_create_envelope(&envelopes, user.id, monthly, "Utilities").await;
    let groceries = find_or_create_envelope(&envelopes, user.id, everyday, "Groceries").await;
    let dining = find_or_create_envelope(&envelopes, user.id, everyday, "Dining Out").await;

    println!("Seeding account...");
    if accounts
        .find_by_common_name(user.id, DEMO_ACCOUNT)
        .await
        .expect("account lookup")
        .is_none()
    {
        accounts
            .create(CreateAccountInput {
                user_id: user.id,
                common_name: DEMO_ACCOUNT.to_string(),
                provider_account_id: None,
            })
            .await
            .expect("Failed to create account");
    }

    println!("Seeding keyword rules...");
    seed_rule(&rules, user.id, "RENT PAYMENT", "All", rent).await;
    seed_rule(&rules, user.id, "ELECTRIC", "All", utilities).await;
    seed_rule(&rules, user.id, "GROCERY", DEMO_ACCOUNT, groceries).await;
    seed_rule(&rules, user.id, "RESTAURANT", DEMO_ACCOUNT, dining).await;

    println!("Seeding starter budget entry...");
    let month_start = NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date");
    transactions
        .upsert_budget_entry(user.id, groceries, month_start, dec!(400))
        .await
        .expect("Failed to seed budget entry");

    let recomputed = transactions
        .recalculated_balance(groceries)
        .await
        .expect("balance recompute");
    let stored = envelopes
        .find_by_id(groceries)
        .await
        .expect("envelope lookup")
        .balance;
    assert_eq!(stored, recomputed, "seeded envelope balance must match its rows");

    println!("Seeding complete!");
}

async fn find_or_create_category(
    categories: &CategoryRepository,
    user_id: Uuid,
    name: &str,
) -> Uuid {
    let existing = categories
        .list_for_user(user_id)
        .await
        .expect("category list")
        .into_iter()
        .find(|category| category.name == name);
    match existing {
        Some(category) => category.id,
        None => {
            categories
                .create(user_id, name)
                .await
                .expect("Failed to create category")
                .id
        }
    }
}

async fn find_or_create_envelope(
    envelopes: &EnvelopeRepository,
    user_id: Uuid,
    category_id: Uuid,
    name: &str,
) -> Uuid {
    let existing = envelopes
        .list_for_user(user_id)
        .await
        .expect("envelope list")
        .into_iter()
        .find(|envelope| envelope.name == name);
    match existing {
        Some(envelope) => envelope.id,
        None => {
            envelopes
                .create(user_id, category_id, name)
                .await
                .expect("Failed to create envelope")
                .id
        }
    }
}

async fn seed_rule(
    rules: &KeywordRuleRepository,
    user_id: Uuid,
    description: &str,
    scope: &str,
    envelope_id: Uuid,
) {
    // save_rule replaces any prior rule with this description.
    rules
        .save_rule(SaveRuleInput {
            user_id,
            description: description.to_string(),
            account_scope: scope.to_string(),
            envelope_id,
        })
        .await
        .expect("Failed to save keyword rule");
}
