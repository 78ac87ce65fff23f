//! Per-field change subscriptions and the before/after comparison that
//! decides which of them fire.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::resolve;
use crate::PathExpr;
use crate::Shape;

/// Receives `(new, old)` in document form.
pub type FieldCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Trigger {
    pub expr: PathExpr,
    pub callback: FieldCallback,
}

/// A callback ready to run once every lock is released.
pub(crate) struct Notification {
    callback: FieldCallback,
    new: Value,
    old: Value,
}

impl Notification {
    pub(crate) fn new(
        callback: FieldCallback,
        new: Value,
        old: Value,
    ) -> Self {
        Self { callback, new, old }
    }

    pub(crate) fn fire(self) {
        (self.callback)(&self.new, &self.old)
    }
}

/// Compares `old` and `new` at every trigger's path and returns the
/// callbacks whose value changed. Resolution auto-creates missing
/// elements; an absent side is replaced by a zero-valued placeholder of
/// the field's shape.
pub(crate) fn collect_notifications(
    shape: &Shape,
    triggers: &[Trigger],
    old: &Value,
    new: &Value,
) -> Vec<Notification> {
    if old == new {
        return Vec::new();
    }

    let mut fired = Vec::new();
    for trigger in triggers {
        let current = match resolve(new, shape, &trigger.expr, true) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(path = %trigger.expr, "skipping trigger: {}", e);
                continue;
            }
        };
        let field_shape = current.shape;
        let previous = resolve(old, shape, &trigger.expr, true)
            .map(|r| r.value)
            .unwrap_or(Value::Null);

        let (new_value, old_value) = match (current.value, previous) {
            (Value::Null, Value::Null) => continue,
            (Value::Null, prev) => (field_shape.placeholder(), prev),
            (cur, Value::Null) => (cur, field_shape.placeholder()),
            (cur, prev) => (cur, prev),
        };
        if new_value == old_value {
            continue;
        }
        debug!(path = %trigger.expr, "field changed");
        fired.push(Notification::new(trigger.callback.clone(), new_value, old_value));
    }
    fired
}
