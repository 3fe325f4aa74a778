// Builder for Firestore `runQuery` structured queries

use serde_json::{json, Value};

use super::codec::encode_field;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Equal => "EQUAL",
            Op::LessThan => "LESS_THAN",
            Op::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Op::GreaterThan => "GREATER_THAN",
            Op::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct FieldFilter {
    field: String,
    op: Op,
    value: Value,
}

#[derive(Debug, Clone)]
pub struct StructuredQuery {
    collection: String,
    filters: Vec<FieldFilter>,
    order_by: Vec<(String, Direction)>,
    limit: Option<u32>,
}

impl StructuredQuery {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// `value` is plain JSON; RFC 3339 strings are compared as timestamps
    pub fn filter(mut self, field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut query = json!({ "from": [{ "collectionId": self.collection }] });

        let mut clauses: Vec<Value> = self
            .filters
            .iter()
            .map(|f| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": f.field },
                        "op": f.op.as_str(),
                        "value": encode_field(&f.field, &f.value),
                    }
                })
            })
            .collect();

        match clauses.len() {
            0 => {}
            1 => query["where"] = clauses.remove(0),
            _ => {
                query["where"] = json!({
                    "compositeFilter": { "op": "AND", "filters": clauses }
                })
            }
        }

        if !self.order_by.is_empty() {
            query["orderBy"] = Value::Array(
                self.order_by
                    .iter()
                    .map(|(field, dir)| {
                        json!({
                            "field": { "fieldPath": field },
                            "direction": match dir {
                                Direction::Ascending => "ASCENDING",
                                Direction::Descending => "DESCENDING",
                            }
                        })
                    })
                    .collect(),
            );
        }

        if let Some(limit) = self.limit {
            query["limit"] = json!(limit);
        }

        json!({ "structuredQuery": query })
    }
}
