//! Property tests for the balance invariant.
//!
//! After any sequence of ledger operations, every envelope's running
//! balance must equal the sum of amounts over its visible, non-duplicate
//! rows. The model below mutates a row set and a balance table strictly
//! through the delta functions, then recomputes from scratch and compares.

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::delta::{
    BalanceDelta, budget_upsert_delta, counts_toward_balance, flip_delta, insert_delta,
    reassignment_deltas, removal_delta,
};
use super::split::{SplitChild, SplitParent, plan_split};

const ENVELOPE_COUNT: usize = 3;

fn envelope_ids() -> [Uuid; ENVELOPE_COUNT] {
    [Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
}

#[derive(Debug, Clone)]
enum Op {
    Insert { envelope: Option<usize>, cents: i64, visible: bool, duplicate: bool },
    Delete { row: usize },
    FlipVisible { row: usize },
    FlipDuplicate { row: usize },
    Reassign { row: usize, envelope: Option<usize> },
    Split { row: usize, children: Vec<(i64, Option<usize>)> },
    BudgetUpsert { envelope: usize, cents: i64 },
}

#[derive(Debug, Clone)]
struct Row {
    envelope_id: Option<Uuid>,
    amount: Decimal,
    is_visible: bool,
    is_duplicate: bool,
    origin: Option<Uuid>,
}

#[derive(Debug, Default)]
struct World {
    rows: Vec<Row>,
    balances: HashMap<Uuid, Decimal>,
    budget_rows: HashMap<Uuid, usize>,
    next_id: u128,
}

impl World {
    fn apply_delta(&mut self, delta: BalanceDelta) {
        *self.balances.entry(delta.envelope_id).or_insert(Decimal::ZERO) += delta.amount;
    }

    fn fresh_id(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128(0x1000 + self.next_id)
    }

    fn insert_row(&mut self, envelope_id: Option<Uuid>, amount: Decimal, visible: bool, duplicate: bool) {
        let counts = counts_toward_balance(visible, duplicate);
        if let Some(delta) = insert_delta(envelope_id, amount, counts) {
            self.apply_delta(delta);
        }
        self.rows.push(Row {
            envelope_id,
            amount,
            is_visible: visible,
            is_duplicate: duplicate,
            origin: None,
        });
    }

    fn delete_row(&mut self, index: usize) {
        let row = self.rows.remove(index);
        let counts = counts_toward_balance(row.is_visible, row.is_duplicate);
        if let Some(delta) = removal_delta(row.envelope_id, row.amount, counts) {
            self.apply_delta(delta);
        }
        // Budget bookkeeping tracks row indexes; rebuild after removal.
        self.budget_rows.retain(|_, tracked| *tracked != index);
        for tracked in self.budget_rows.values_mut() {
            if *tracked > index {
                *tracked -= 1;
            }
        }
    }

    fn recomputed(&self) -> HashMap<Uuid, Decimal> {
        let mut sums: HashMap<Uuid, Decimal> = HashMap::new();
        for row in &self.rows {
            if let Some(envelope_id) = row.envelope_id {
                if counts_toward_balance(row.is_visible, row.is_duplicate) {
                    *sums.entry(envelope_id).or_insert(Decimal::ZERO) += row.amount;
                }
            }
        }
        sums
    }
}

fn envelope_strategy() -> impl Strategy<Value = Option<usize>> {
    prop_oneof![Just(None), (0..ENVELOPE_COUNT).prop_map(Some)]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let cents = -10_000i64..10_000i64;
    prop_oneof![
        (envelope_strategy(), cents.clone(), any::<bool>(), any::<bool>()).prop_map(
            |(envelope, cents, visible, duplicate)| Op::Insert { envelope, cents, visible, duplicate }
        ),
        (0usize..16).prop_map(|row| Op::Delete { row }),
        (0usize..16).prop_map(|row| Op::FlipVisible { row }),
        (0usize..16).prop_map(|row| Op::FlipDuplicate { row }),
        ((0usize..16), envelope_strategy())
            .prop_map(|(row, envelope)| Op::Reassign { row, envelope }),
        (
            (0usize..16),
            prop::collection::vec((cents.clone(), envelope_strategy()), 1..4)
        )
            .prop_map(|(row, children)| Op::Split { row, children }),
        ((0..ENVELOPE_COUNT), cents).prop_map(|(envelope, cents)| Op::BudgetUpsert { envelope, cents }),
    ]
}

fn apply(world: &mut World, op: Op) {
    let envelopes = envelope_ids();
    match op {
        Op::Insert { envelope, cents, visible, duplicate } => {
            world.insert_row(envelope.map(|i| envelopes[i]), Decimal::new(cents, 2), visible, duplicate);
        }
        Op::Delete { row } => {
            if !world.rows.is_empty() {
                world.delete_row(row % world.rows.len());
            }
        }
        Op::FlipVisible { row } => {
            if world.rows.is_empty() {
                return;
            }
            let index = row % world.rows.len();
            let (envelope_id, amount, was_visible, duplicate) = {
                let r = &world.rows[index];
                (r.envelope_id, r.amount, r.is_visible, r.is_duplicate)
            };
            let before = counts_toward_balance(was_visible, duplicate);
            let after = counts_toward_balance(!was_visible, duplicate);
            if let Some(delta) = flip_delta(envelope_id, amount, before, after) {
                world.apply_delta(delta);
            }
            world.rows[index].is_visible = !was_visible;
        }
        Op::FlipDuplicate { row } => {
            if world.rows.is_empty() {
                return;
            }
            let index = row % world.rows.len();
            let (envelope_id, amount, visible, was_duplicate) = {
                let r = &world.rows[index];
                (r.envelope_id, r.amount, r.is_visible, r.is_duplicate)
            };
            let before = counts_toward_balance(visible, was_duplicate);
            let after = counts_toward_balance(visible, !was_duplicate);
            if let Some(delta) = flip_delta(envelope_id, amount, before, after) {
                world.apply_delta(delta);
            }
            world.rows[index].is_duplicate = !was_duplicate;
        }
        Op::Reassign { row, envelope } => {
            if world.rows.is_empty() {
                return;
            }
            let index = row % world.rows.len();
            let new_envelope = envelope.map(|i| envelopes[i]);
            let (old_envelope, amount, visible, duplicate) = {
                let r = &world.rows[index];
                (r.envelope_id, r.amount, r.is_visible, r.is_duplicate)
            };
            let counts = counts_toward_balance(visible, duplicate);
            for delta in reassignment_deltas(old_envelope, new_envelope, amount, counts) {
                world.apply_delta(delta);
            }
            world.rows[index].envelope_id = new_envelope;
        }
        Op::Split { row, children } => {
            if world.rows.is_empty() {
                return;
            }
            let index = row % world.rows.len();
            let parent_id = world.fresh_id();
            let parent = {
                let r = &world.rows[index];
                SplitParent {
                    id: parent_id,
                    origin_transaction_id: r.origin,
                    envelope_id: r.envelope_id,
                    amount: r.amount,
                    counts: counts_toward_balance(r.is_visible, r.is_duplicate),
                }
            };
            let split_children: Vec<SplitChild> = children
                .iter()
                .map(|&(cents, envelope)| SplitChild {
                    amount: Decimal::new(cents, 2),
                    envelope_id: envelope.map(|i| envelopes[i]),
                })
                .collect();
            let plan = plan_split(&parent, &split_children).expect("children are non-empty");

            world.rows.remove(index);
            world.budget_rows.retain(|_, tracked| *tracked != index);
            for tracked in world.budget_rows.values_mut() {
                if *tracked > index {
                    *tracked -= 1;
                }
            }
            if let Some(delta) = plan.parent_delta {
                world.apply_delta(delta);
            }
            for (child, delta) in split_children.iter().zip(plan.child_deltas) {
                if let Some(delta) = delta {
                    world.apply_delta(delta);
                }
                world.rows.push(Row {
                    envelope_id: child.envelope_id,
                    amount: child.amount,
                    is_visible: true,
                    is_duplicate: false,
                    origin: Some(plan.origin_transaction_id),
                });
            }
        }
        Op::BudgetUpsert { envelope, cents } => {
            let envelope_id = envelopes[envelope];
            let new_amount = Decimal::new(cents, 2);
            let previous = world
                .budget_rows
                .get(&envelope_id)
                .map(|&index| world.rows[index].amount);
            let delta = budget_upsert_delta(previous, new_amount);
            world.apply_delta(BalanceDelta { envelope_id, amount: delta });

            if let Some(&index) = world.budget_rows.get(&envelope_id) {
                world.rows[index].amount = new_amount;
            } else {
                world.rows.push(Row {
                    envelope_id: Some(envelope_id),
                    amount: new_amount,
                    is_visible: true,
                    is_duplicate: false,
                    origin: None,
                });
                world.budget_rows.insert(envelope_id, world.rows.len() - 1);
            }
        }
    }
}

proptest! {
    #[test]
    fn balances_always_equal_the_recomputed_sums(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut world = World::default();
        for op in ops {
            apply(&mut world, op);
        }

        let recomputed = world.recomputed();
        for envelope_id in envelope_ids() {
            let stored = world.balances.get(&envelope_id).copied().unwrap_or(Decimal::ZERO);
            let expected = recomputed.get(&envelope_id).copied().unwrap_or(Decimal::ZERO);
            prop_assert_eq!(stored, expected, "envelope {}", envelope_id);
        }
    }
}
