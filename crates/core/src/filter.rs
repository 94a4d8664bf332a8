//! Narrows a context bundle to the records the model asked for.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::context::{Collection, ContextBundle, Criterion, FilterCriteria};

/// Applies `criteria` to every filterable collection of `context`.
///
/// - a collection without criteria is left out of the result, not emptied;
/// - a source collection that is not an array becomes `[]`;
/// - a criteria value equal to `all` (any case) passes the whole collection;
/// - otherwise a record survives if it matches any criteria object, and it
///   matches one when every named field is present and contains the value,
///   case-insensitively.
///
/// `user` is always copied. Keys outside the five collections are dropped.
pub fn filter_context(context: &ContextBundle, criteria: &FilterCriteria) -> ContextBundle {
    let mut collections = Map::new();

    for collection in Collection::ALL {
        let Some(criteria_list) = criteria.for_collection(collection) else {
            continue;
        };

        let Some(records) = context.collection(collection).and_then(Value::as_array) else {
            warn!(
                event_name = "chat.context.not_an_array",
                collection = collection.key(),
                "context collection is not an array, forwarding it empty"
            );
            collections.insert(collection.key().to_string(), Value::Array(Vec::new()));
            continue;
        };

        if criteria_list.iter().any(requests_everything) {
            collections.insert(collection.key().to_string(), Value::Array(records.clone()));
            continue;
        }

        let kept = records
            .iter()
            .filter(|record| criteria_list.iter().any(|criterion| matches(record, criterion)))
            .cloned()
            .collect::<Vec<_>>();

        info!(
            event_name = "chat.context.filtered",
            collection = collection.key(),
            original = records.len(),
            filtered = kept.len(),
            reduction = records.len() - kept.len(),
            "context collection filtered"
        );
        collections.insert(collection.key().to_string(), Value::Array(kept));
    }

    ContextBundle { user: context.user.clone(), collections }
}

fn requests_everything(criterion: &Criterion) -> bool {
    criterion.values().any(|value| js_string(value).to_lowercase() == "all")
}

fn matches(record: &Value, criterion: &Criterion) -> bool {
    criterion.iter().all(|(field, expected)| match record.get(field) {
        None | Some(Value::Null) => false,
        Some(actual) => {
            js_string(actual).to_lowercase().contains(&js_string(expected).to_lowercase())
        }
    })
}

/// String form of a JSON value as a browser would print it with `String(x)`.
fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e21 => {
                format!("{float:.0}")
            }
            _ => number.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
