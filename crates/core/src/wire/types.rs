use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

type Fields = Map<String, Value>;

fn id_of(fields: &Fields) -> Option<u64> {
    fields.get("id").and_then(Value::as_u64)
}

fn status_of(fields: &Fields) -> Option<&str> {
    fields.get("status").and_then(Value::as_str)
}

/// Objects of the array under `key`; anything else yields nothing.
fn children<T>(fields: &Fields, key: &str, build: fn(Fields) -> T) -> Vec<T> {
    match fields.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_object)
            .map(|object| build(object.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

fn child<T>(fields: &Fields, key: &str, build: fn(Fields) -> T) -> Option<T> {
    fields
        .get(key)
        .and_then(Value::as_object)
        .map(|object| build(object.clone()))
}

/// Serialize a node as its received object and deserialize it from any object.
macro_rules! opaque_node {
    ($node:ty) => {
        impl Serialize for $node {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.fields.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $node {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Fields::deserialize(deserializer).map(Self::from_fields)
            }
        }
    };
}

/// The ride assigned to one tablet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    fields: Fields,
    batches: Vec<WorkBatch>,
}

impl Manifest {
    pub fn from_fields(fields: Fields) -> Self {
        let batches = children(&fields, "fact_rides", WorkBatch::from_fields);
        Self { fields, batches }
    }

    /// Every field as received, in received order.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn id(&self) -> Option<u64> {
        id_of(&self.fields)
    }

    /// Batches in manifest order; empty when the server sent none.
    pub fn batches(&self) -> &[WorkBatch] {
        &self.batches
    }
}

/// A group of stops inside a ride (`fact_rides` entry).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkBatch {
    fields: Fields,
    items: Vec<WorkItem>,
}

impl WorkBatch {
    pub fn from_fields(fields: Fields) -> Self {
        let items = children(&fields, "ride_points", WorkItem::from_fields);
        Self { fields, items }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn id(&self) -> Option<u64> {
        id_of(&self.fields)
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One stop that can receive its own status update (`ride_points` entry).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItem {
    fields: Fields,
    order: Option<Order>,
}

impl WorkItem {
    pub fn from_fields(fields: Fields) -> Self {
        let order = child(&fields, "order", Order::from_fields);
        Self { fields, order }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// `None` when absent, negative, or not an integer.
    pub fn id(&self) -> Option<u64> {
        id_of(&self.fields)
    }

    pub fn status(&self) -> Option<&str> {
        status_of(&self.fields)
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// The id to address in an update call, if it is usable (positive).
    pub fn addressable_id(&self) -> Option<u64> {
        self.id().filter(|id| *id > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    fields: Fields,
    service_object: Option<ServiceObject>,
}

impl Order {
    pub fn from_fields(fields: Fields) -> Self {
        let service_object = child(&fields, "service_object", ServiceObject::from_fields);
        Self {
            fields,
            service_object,
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn id(&self) -> Option<u64> {
        id_of(&self.fields)
    }

    pub fn status(&self) -> Option<&str> {
        status_of(&self.fields)
    }

    pub fn service_object(&self) -> Option<&ServiceObject> {
        self.service_object.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceObject {
    fields: Fields,
}

impl ServiceObject {
    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn id(&self) -> Option<u64> {
        id_of(&self.fields)
    }
}

opaque_node!(Manifest);
opaque_node!(WorkBatch);
opaque_node!(WorkItem);
opaque_node!(Order);
opaque_node!(ServiceObject);

/// Body sent with every status update: a fixed transition to "departure".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub ride_point: StatusUpdateBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdateBody {
    pub status: String,
}

impl StatusUpdate {
    pub fn departure() -> Self {
        Self {
            ride_point: StatusUpdateBody {
                status: "departure".to_string(),
            },
        }
    }
}
