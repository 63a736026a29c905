use serde_json::Value;

use crate::slot::{EntrySlot, Slot, ValueSlot};

/// One navigation step of a compiled path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rule {
    /// `.name`, `.'quoted'` or `['quoted']`: a map entry.
    Key(String),
    /// `.*`: every map value or every array element.
    AnyKey,
    /// `[N]`: an array element. Out-of-range indices select nothing.
    Index(usize),
    /// `[*]`: every array element.
    AnyIndex,
    /// `[?(@.sub == 'value')]`: children whose sub-path yields `value`.
    Filter { rules: Vec<Rule>, value: String },
}

impl Rule {
    fn selects(&self, child: &Value) -> bool {
        match self {
            Rule::Filter { rules, value } => {
                evaluate(rules, child).into_iter().any(|v| v.as_str() == Some(value.as_str()))
            }
            _ => false,
        }
    }

    fn children<'a>(&self, v: &'a Value) -> Vec<&'a Value> {
        match (self, v) {
            (Rule::Key(k), Value::Object(m)) => m.get(k).into_iter().collect(),
            (Rule::AnyKey, Value::Object(m)) => m.values().collect(),
            (Rule::AnyKey | Rule::AnyIndex, Value::Array(a)) => a.iter().collect(),
            (Rule::Index(i), Value::Array(a)) => a.get(*i).into_iter().collect(),
            (Rule::Filter { .. }, Value::Object(m)) => m.values().filter(|c| self.selects(c)).collect(),
            (Rule::Filter { .. }, Value::Array(a)) => a.iter().filter(|c| self.selects(c)).collect(),
            _ => Vec::new(),
        }
    }

    fn children_mut<'a>(&self, v: &'a mut Value) -> Vec<&'a mut Value> {
        match (self, v) {
            (Rule::Key(k), Value::Object(m)) => m.get_mut(k).into_iter().collect(),
            (Rule::AnyKey, Value::Object(m)) => m.values_mut().collect(),
            (Rule::AnyKey | Rule::AnyIndex, Value::Array(a)) => a.iter_mut().collect(),
            (Rule::Index(i), Value::Array(a)) => a.get_mut(*i).into_iter().collect(),
            (Rule::Filter { .. }, Value::Object(m)) => m.values_mut().filter(|c| self.selects(c)).collect(),
            (Rule::Filter { .. }, Value::Array(a)) => a.iter_mut().filter(|c| self.selects(c)).collect(),
            _ => Vec::new(),
        }
    }

    /// Emit a slot for every location this rule selects in `v`. Map
    /// selections become entry slots (so they can be removed), array
    /// selections become value slots.
    fn slots(&self, v: &mut Value, f: &mut dyn FnMut(&mut dyn Slot)) {
        match (self, v) {
            (Rule::Key(k), Value::Object(map)) => f(&mut EntrySlot::new(map, k.clone())),
            (Rule::AnyKey, Value::Object(map)) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                for key in keys {
                    f(&mut EntrySlot::new(map, key));
                }
            }
            (Rule::Filter { .. }, Value::Object(map)) => {
                let keys: Vec<String> =
                    map.iter().filter(|(_, c)| self.selects(c)).map(|(k, _)| k.clone()).collect();
                for key in keys {
                    f(&mut EntrySlot::new(map, key));
                }
            }
            (Rule::Index(i), Value::Array(items)) => {
                if let Some(item) = items.get_mut(*i) {
                    f(&mut ValueSlot::new(item));
                }
            }
            (Rule::AnyKey | Rule::AnyIndex | Rule::Filter { .. }, Value::Array(items)) => {
                for item in items.iter_mut() {
                    if matches!(self, Rule::Filter { .. }) && !self.selects(item) {
                        continue;
                    }
                    f(&mut ValueSlot::new(item));
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn evaluate<'a>(rules: &[Rule], root: &'a Value) -> Vec<&'a Value> {
    let mut current = vec![root];
    for rule in rules {
        current = current.into_iter().flat_map(|v| rule.children(v)).collect();
        if current.is_empty() {
            break;
        }
    }
    current
}

pub(crate) fn visit_slots(rules: &[Rule], v: &mut Value, f: &mut dyn FnMut(&mut dyn Slot)) {
    match rules.split_first() {
        None => f(&mut ValueSlot::new(v)),
        Some((rule, [])) => rule.slots(v, f),
        Some((rule, rest)) => {
            for child in rule.children_mut(v) {
                visit_slots(rest, child, f);
            }
        }
    }
}
