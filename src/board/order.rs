//! Order model: integer positions inside a container.
//!
//! Lists are ordered among a user's lists, tasks inside their list. After any
//! structural change the affected sequence is renumbered to `0..n-1`.

use uuid::Uuid;

use crate::model::{List, Task};

/// Something positioned by an integer `order` field.
pub trait Ordered {
    fn order(&self) -> i64;
    fn set_order(&mut self, order: i64);
    /// Secondary sort key for ties.
    fn tie_key(&self) -> Uuid;
}

impl Ordered for Task {
    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    fn tie_key(&self) -> Uuid {
        self.id
    }
}

impl Ordered for List {
    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    fn tie_key(&self) -> Uuid {
        self.id
    }
}

/// Assign `order == index` to every element, keeping the arrangement.
pub fn renumber<T: Ordered>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_order(index as i64);
    }
}

/// Owned variant of [`renumber`].
pub fn renumbered<T: Ordered>(mut items: Vec<T>) -> Vec<T> {
    renumber(&mut items);
    items
}

/// Sort ascending by `order`, breaking ties by identifier.
pub fn sort_by_order<T: Ordered>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.order()
            .cmp(&b.order())
            .then_with(|| a.tie_key().cmp(&b.tie_key()))
    });
}

/// True when the orders are exactly `0..n-1` in sequence.
pub fn is_contiguous<T: Ordered>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.order() == index as i64)
}
