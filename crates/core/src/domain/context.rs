use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::records::{Department, Role};

/// The requesting user. Always forwarded to the model unfiltered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
}

impl UserProfile {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            avatar_url: None,
            company_id: None,
            role: None,
            department: None,
        }
    }
}

/// The record collections a context bundle may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Companies,
    Employees,
    Tasks,
    Sales,
    Appointments,
}

impl Collection {
    pub const ALL: [Self; 5] =
        [Self::Companies, Self::Employees, Self::Tasks, Self::Sales, Self::Appointments];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Companies => "companies",
            Self::Employees => "employees",
            Self::Tasks => "tasks",
            Self::Sales => "sales",
            Self::Appointments => "appointments",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Snapshot of business data sent alongside a question.
///
/// Collections stay loosely typed: the caller's records are forwarded to the
/// model as-is, and the filter tolerates a collection that is not an array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub user: UserProfile,
    #[serde(flatten)]
    pub collections: Map<String, Value>,
}

impl ContextBundle {
    pub fn new(user: UserProfile) -> Self {
        Self { user, collections: Map::new() }
    }

    pub fn with_collection(mut self, collection: Collection, value: Value) -> Self {
        self.collections.insert(collection.key().to_string(), value);
        self
    }

    pub fn collection(&self, collection: Collection) -> Option<&Value> {
        self.collections.get(collection.key())
    }

    /// Record count of a collection; zero when absent or not an array.
    pub fn len_of(&self, collection: Collection) -> usize {
        self.collection(collection).and_then(Value::as_array).map(Vec::len).unwrap_or(0)
    }
}

/// One field -> substring criteria object, e.g. `{"department": "Marketing"}`.
pub type Criterion = Map<String, Value>;

/// Which records of each collection the model asked to see.
///
/// A collection with no entry is dropped from the filtered context entirely.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companies: Option<Vec<Criterion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<Vec<Criterion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Criterion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales: Option<Vec<Criterion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointments: Option<Vec<Criterion>>,
}

impl FilterCriteria {
    pub fn for_collection(&self, collection: Collection) -> Option<&[Criterion]> {
        let entry = match collection {
            Collection::Companies => &self.companies,
            Collection::Employees => &self.employees,
            Collection::Tasks => &self.tasks,
            Collection::Sales => &self.sales,
            Collection::Appointments => &self.appointments,
        };
        entry.as_deref()
    }

    pub fn with(mut self, collection: Collection, criteria: Vec<Criterion>) -> Self {
        let slot = match collection {
            Collection::Companies => &mut self.companies,
            Collection::Employees => &mut self.employees,
            Collection::Tasks => &mut self.tasks,
            Collection::Sales => &mut self.sales,
            Collection::Appointments => &mut self.appointments,
        };
        *slot = Some(criteria);
        self
    }

    pub fn is_empty(&self) -> bool {
        Collection::ALL.iter().all(|collection| self.for_collection(*collection).is_none())
    }
}
