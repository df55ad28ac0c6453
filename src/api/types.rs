//! Insight API request and response types.
//!
//! These types model the Insight REST API (`rest/insight/1.0` on Data
//! Center, `jsm/insight/workspace/{id}/v1` on cloud). Fields that callers
//! rarely need are kept as raw `serde_json::Value`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An object schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    /// The schema ID.
    pub id: i64,
    /// The schema name.
    pub name: String,
    /// The schema key used as prefix of object keys (e.g., "ITSM").
    #[serde(default)]
    pub object_schema_key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub object_count: Option<u64>,
    #[serde(default)]
    pub object_type_count: Option<u64>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// The schema list.
///
/// Data Center returns `{"objectschemas": [...]}`, cloud a paged
/// `{"values": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSchemaList {
    #[serde(rename = "objectschemas", alias = "values", default)]
    pub object_schemas: Vec<ObjectSchema>,
}

/// An object type within a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    /// The object type ID.
    pub id: i64,
    /// The object type name.
    pub name: String,
    /// The object type kind as reported by the API.
    #[serde(rename = "type", default)]
    pub kind: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<Value>,
    /// Ordering among siblings.
    #[serde(default)]
    pub position: i64,
    /// The parent object type, if this type inherits from one.
    #[serde(default)]
    pub parent_object_type_id: Option<i64>,
    #[serde(default)]
    pub object_schema_id: Option<i64>,
    #[serde(default)]
    pub object_count: Option<u64>,
    #[serde(default)]
    pub inherited: bool,
    #[serde(default)]
    pub abstract_object_type: bool,
    #[serde(default)]
    pub attributes: Vec<Value>,
}

/// An attribute definition of an object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeAttribute {
    /// The attribute ID.
    pub id: i64,
    /// The attribute name.
    pub name: String,
    /// Whether this attribute is the object's label.
    #[serde(default)]
    pub label: bool,
    /// Attribute type (0 default, 1 object reference, 2 user, ...).
    #[serde(rename = "type", default)]
    pub kind: i64,
    #[serde(default)]
    pub default_type: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub unique_attribute: bool,
    #[serde(default)]
    pub minimum_cardinality: i64,
    #[serde(default)]
    pub maximum_cardinality: i64,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub reference_object_type_id: Option<i64>,
    #[serde(default)]
    pub object_type: Option<Value>,
}

impl ObjectTypeAttribute {
    /// Whether values of this attribute point at other objects.
    pub fn is_reference(&self) -> bool {
        self.kind == 1
    }
}

/// Minimal object type embedded in an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeRef {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub object_schema_id: Option<i64>,
}

/// A single value of an object attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub display_value: Option<Value>,
    #[serde(default)]
    pub search_value: Option<String>,
    #[serde(default)]
    pub referenced_type: Option<bool>,
    #[serde(default)]
    pub referenced_object: Option<Value>,
}

impl AttributeValue {
    /// The human-readable form of the value.
    ///
    /// Prefers `displayValue`, then `value`, then the referenced object's
    /// label.
    pub fn display(&self) -> Option<String> {
        let render = |v: &Value| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        };

        self.display_value
            .as_ref()
            .and_then(render)
            .or_else(|| self.value.as_ref().and_then(render))
            .or_else(|| {
                self.referenced_object
                    .as_ref()
                    .and_then(|o| o.get("label"))
                    .and_then(render)
            })
    }
}

/// An attribute of an object with its values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttribute {
    #[serde(default)]
    pub id: Option<i64>,
    pub object_type_attribute_id: i64,
    #[serde(default)]
    pub object_attribute_values: Vec<AttributeValue>,
    #[serde(default)]
    pub object_id: Option<i64>,
}

/// An Insight object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightObject {
    /// The object ID.
    pub id: i64,
    /// The object label (value of the label attribute).
    #[serde(default)]
    pub label: String,
    /// The object key (e.g., "ITSM-1234").
    #[serde(default)]
    pub object_key: String,
    #[serde(default)]
    pub object_type: Option<ObjectTypeRef>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub has_avatar: bool,
    #[serde(default)]
    pub attributes: Vec<ObjectAttribute>,
    #[serde(default)]
    pub extended_info: Option<Value>,
    #[serde(rename = "_links", default)]
    pub links: Option<Value>,
}

impl InsightObject {
    /// Get the values of one attribute.
    pub fn attribute(&self, object_type_attribute_id: i64) -> Option<&ObjectAttribute> {
        self.attributes
            .iter()
            .find(|a| a.object_type_attribute_id == object_type_attribute_id)
    }

    /// Flatten the attributes into `name -> display values`.
    ///
    /// Attribute names come from `definitions`; attributes without a known
    /// definition are keyed by their numeric ID.
    pub fn flatten_attributes(
        &self,
        definitions: &[ObjectTypeAttribute],
    ) -> BTreeMap<String, Vec<String>> {
        self.attributes
            .iter()
            .map(|attr| {
                let name = definitions
                    .iter()
                    .find(|d| d.id == attr.object_type_attribute_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| attr.object_type_attribute_id.to_string());
                let values = attr
                    .object_attribute_values
                    .iter()
                    .filter_map(AttributeValue::display)
                    .collect();
                (name, values)
            })
            .collect()
    }
}

/// One page of an IQL/AQL query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPage {
    /// The objects on this page.
    #[serde(default)]
    pub object_entries: Vec<InsightObject>,
    /// Attribute definitions for the returned objects.
    #[serde(default)]
    pub object_type_attributes: Vec<ObjectTypeAttribute>,
    #[serde(default)]
    pub object_type_id: Option<i64>,
    /// Total number of objects matching the query.
    #[serde(default)]
    pub total_filter_count: u64,
    #[serde(default)]
    pub start_index: u64,
    #[serde(default)]
    pub to_index: u64,
    #[serde(default)]
    pub page_object_size: u64,
    /// This page's number (1-based).
    #[serde(default = "first_page")]
    pub page_number: u32,
    /// The total number of pages.
    #[serde(default)]
    pub page_size: u32,
    #[serde(default, alias = "qlQuery")]
    pub iql: Option<String>,
}

fn first_page() -> u32 {
    1
}

impl ObjectPage {
    /// Check if there are more pages of results.
    pub fn has_more(&self) -> bool {
        self.page_number < self.page_size
    }
}

/// All objects of a query, collected across pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCollection {
    pub objects: Vec<InsightObject>,
    pub object_type_attributes: Vec<ObjectTypeAttribute>,
    pub total_filter_count: u64,
    pub pages_fetched: u32,
}

/// A status type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// 0 inactive, 1 active, 2 pending.
    #[serde(default)]
    pub category: i64,
    #[serde(default)]
    pub object_schema_id: Option<i64>,
}

/// An attribute value for object creation or update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInput {
    pub object_type_attribute_id: i64,
    pub object_attribute_values: Vec<ValueInput>,
}

/// A single value for an attribute input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueInput {
    pub value: String,
}

impl AttributeInput {
    /// Build an input setting one attribute to the given values.
    pub fn new<I, S>(object_type_attribute_id: i64, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object_type_attribute_id,
            object_attribute_values: values
                .into_iter()
                .map(|v| ValueInput { value: v.into() })
                .collect(),
        }
    }
}

/// Request body for creating or updating an object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPayload {
    pub object_type_id: i64,
    pub attributes: Vec<AttributeInput>,
    pub has_avatar: bool,
    #[serde(rename = "avatarUUID")]
    pub avatar_uuid: String,
}

impl ObjectPayload {
    pub fn new(object_type_id: i64, attributes: Vec<AttributeInput>) -> Self {
        Self {
            object_type_id,
            attributes,
            has_avatar: false,
            avatar_uuid: String::new(),
        }
    }
}

/// A cloud workspace entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub workspace_id: String,
}

/// Response of the cloud workspace discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceList {
    #[serde(default)]
    pub values: Vec<Workspace>,
}
