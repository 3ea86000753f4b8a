//! Ordered binding slots.
//!
//! Bindings are stored per clause so that clauses may be added in any
//! order while the flattened list always follows the order in which the
//! clauses appear in compiled SQL.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::value::SqlValue;

/// A clause that owns bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSlot {
    /// Select-list subqueries and raw selects.
    Select,
    /// FROM subqueries and raw FROM.
    From,
    /// JOIN constraints and join subqueries.
    Join,
    /// WHERE clause.
    Where,
    /// Raw GROUP BY.
    GroupBy,
    /// HAVING clause.
    Having,
    /// Raw ORDER BY.
    Order,
    /// Unioned queries.
    Union,
    /// Raw ORDER BY applied to a union.
    UnionOrder,
}

impl BindingSlot {
    /// All slots in flattening order.
    pub const ALL: [Self; 9] = [
        Self::Select,
        Self::From,
        Self::Join,
        Self::Where,
        Self::GroupBy,
        Self::Having,
        Self::Order,
        Self::Union,
        Self::UnionOrder,
    ];

    /// Slot name as used in `FromStr`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::From => "from",
            Self::Join => "join",
            Self::Where => "where",
            Self::GroupBy => "groupBy",
            Self::Having => "having",
            Self::Order => "order",
            Self::Union => "union",
            Self::UnionOrder => "unionOrder",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("invalid binding type: {s}")))
    }
}

/// Binding values grouped by slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    slots: [Vec<SqlValue>; 9],
}

impl Bindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Values in one slot.
    #[must_use]
    pub fn slot(&self, slot: BindingSlot) -> &[SqlValue] {
        &self.slots[slot.index()]
    }

    /// Appends a value to a slot.
    pub fn add(&mut self, slot: BindingSlot, value: SqlValue) {
        self.slots[slot.index()].push(value);
    }

    /// Appends several values to a slot.
    pub fn extend(&mut self, slot: BindingSlot, values: impl IntoIterator<Item = SqlValue>) {
        self.slots[slot.index()].extend(values);
    }

    /// Replaces a slot's values.
    pub fn set(&mut self, slot: BindingSlot, values: Vec<SqlValue>) {
        self.slots[slot.index()] = values;
    }

    /// Empties a slot.
    pub fn clear(&mut self, slot: BindingSlot) {
        self.slots[slot.index()].clear();
    }

    /// Appends every slot of `other` to the matching slot.
    pub fn merge(&mut self, other: &Self) {
        for slot in BindingSlot::ALL {
            self.extend(slot, other.slot(slot).iter().cloned());
        }
    }

    /// All values in slot order.
    #[must_use]
    pub fn flatten(&self) -> Vec<SqlValue> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// All values in slot order, skipping the given slots.
    #[must_use]
    pub fn flatten_except(&self, excluded: &[BindingSlot]) -> Vec<SqlValue> {
        BindingSlot::ALL
            .into_iter()
            .filter(|slot| !excluded.contains(slot))
            .flat_map(|slot| self.slot(slot).iter().cloned())
            .collect()
    }

    /// Returns true when every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_follows_slot_order_not_insertion_order() {
        let mut bindings = Bindings::new();
        bindings.add(BindingSlot::Order, SqlValue::Int(7));
        bindings.add(BindingSlot::Where, SqlValue::Int(3));
        bindings.add(BindingSlot::Select, SqlValue::Int(1));
        bindings.add(BindingSlot::Having, SqlValue::Int(5));
        bindings.add(BindingSlot::Join, SqlValue::Int(2));
        assert_eq!(
            bindings.flatten(),
            vec![
                SqlValue::Int(1),
                SqlValue::Int(2),
                SqlValue::Int(3),
                SqlValue::Int(5),
                SqlValue::Int(7)
            ]
        );
    }

    #[test]
    fn test_flatten_except() {
        let mut bindings = Bindings::new();
        bindings.add(BindingSlot::Select, SqlValue::Int(1));
        bindings.add(BindingSlot::Where, SqlValue::Int(2));
        assert_eq!(
            bindings.flatten_except(&[BindingSlot::Select]),
            vec![SqlValue::Int(2)]
        );
    }

    #[test]
    fn test_slot_names_parse() {
        assert_eq!("unionOrder".parse::<BindingSlot>(), Ok(BindingSlot::UnionOrder));
        assert_eq!("groupBy".parse::<BindingSlot>(), Ok(BindingSlot::GroupBy));
        assert!(matches!(
            "limit".parse::<BindingSlot>(),
            Err(Error::InvalidArgument(_))
        ));
    }
}
