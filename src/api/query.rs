//! Query builders for IQL/AQL searches and attribute listings.

use serde_json::{json, Value};

/// Default number of results per page.
pub const DEFAULT_RESULTS_PER_PAGE: u32 = 25;

/// An IQL (or AQL) object search.
///
/// Used for `GET iql/objects` and `GET aql/objects`; only the name of the
/// query parameter differs between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqlQuery {
    /// The query string, e.g. `objectType = "Physical Host"`.
    pub query: String,
    /// Limit the search to one schema.
    pub object_schema_id: Option<i64>,
    /// 1-based page number.
    pub page: u32,
    pub order_by_attribute_id: Option<i64>,
    pub order_asc: bool,
    pub results_per_page: u32,
    pub include_attributes: bool,
    /// How deep referenced objects are expanded.
    pub include_attributes_deep: u32,
    /// Include the attribute definitions of the returned object types.
    pub include_type_attributes: bool,
    /// Include open issues and attachments.
    pub include_extended_info: bool,
    pub extended: Option<String>,
}

impl IqlQuery {
    /// Create a query for the first page with default options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            object_schema_id: None,
            page: 1,
            order_by_attribute_id: None,
            order_asc: true,
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            include_attributes: true,
            include_attributes_deep: 1,
            include_type_attributes: false,
            include_extended_info: false,
            extended: None,
        }
    }

    pub fn schema(mut self, schema_id: i64) -> Self {
        self.object_schema_id = Some(schema_id);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn results_per_page(mut self, results: u32) -> Self {
        self.results_per_page = results.max(1);
        self
    }

    pub fn order_by(mut self, attribute_id: i64, ascending: bool) -> Self {
        self.order_by_attribute_id = Some(attribute_id);
        self.order_asc = ascending;
        self
    }

    pub fn attributes_deep(mut self, depth: u32) -> Self {
        self.include_attributes_deep = depth;
        self
    }

    pub fn include_type_attributes(mut self, include: bool) -> Self {
        self.include_type_attributes = include;
        self
    }

    pub fn include_extended_info(mut self, include: bool) -> Self {
        self.include_extended_info = include;
        self
    }

    /// Build the query parameters, naming the query string `query_param`.
    pub fn to_params(&self, query_param: &str) -> Vec<(String, String)> {
        let mut params = vec![
            (query_param.to_string(), self.query.clone()),
            ("page".to_string(), self.page.to_string()),
            ("resultPerPage".to_string(), self.results_per_page.to_string()),
            ("includeAttributes".to_string(), self.include_attributes.to_string()),
            (
                "includeAttributesDeep".to_string(),
                self.include_attributes_deep.to_string(),
            ),
            (
                "includeTypeAttributes".to_string(),
                self.include_type_attributes.to_string(),
            ),
            (
                "includeExtendedInfo".to_string(),
                self.include_extended_info.to_string(),
            ),
            ("orderAsc".to_string(), self.order_asc.to_string()),
        ];

        if let Some(schema_id) = self.object_schema_id {
            params.push(("objectSchemaId".to_string(), schema_id.to_string()));
        }
        if let Some(attribute_id) = self.order_by_attribute_id {
            params.push(("orderByAttributeId".to_string(), attribute_id.to_string()));
        }
        if let Some(extended) = &self.extended {
            params.push(("extended".to_string(), extended.clone()));
        }

        params
    }
}

/// Filters for attribute listings of a schema or an object type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeQuery {
    /// Only attributes whose value is editable.
    pub only_value_editable: bool,
    pub order_by_name: bool,
    /// Only attributes whose name starts with this string.
    pub query: Option<String>,
    /// Only attributes for which values exist.
    pub include_value_exist: bool,
    pub exclude_parent_attributes: bool,
    pub include_children: bool,
    pub order_by_required: bool,
}

impl AttributeQuery {
    /// Defaults for object-type attribute listings, which include children.
    pub fn for_object_type() -> Self {
        Self {
            include_children: true,
            ..Self::default()
        }
    }

    /// Parameters sending only the flags that are set.
    pub fn set_params(&self) -> Vec<(String, String)> {
        self.all_params()
            .into_iter()
            .filter(|(_, v)| v != "false")
            .collect()
    }

    /// Parameters sending every flag, plus the name filter when present.
    pub fn all_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("onlyValueEditable".to_string(), self.only_value_editable.to_string()),
            ("orderByName".to_string(), self.order_by_name.to_string()),
            ("includeValueExist".to_string(), self.include_value_exist.to_string()),
            (
                "excludeParentAttributes".to_string(),
                self.exclude_parent_attributes.to_string(),
            ),
            ("includeChildren".to_string(), self.include_children.to_string()),
            ("orderByRequired".to_string(), self.order_by_required.to_string()),
        ];
        if let Some(query) = self.query.as_ref().filter(|q| !q.is_empty()) {
            params.push(("query".to_string(), query.clone()));
        }
        params
    }
}

/// An AQL search through the object navigator list (`POST object/navlist/aql`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavlistQuery {
    pub object_schema_id: i64,
    pub object_type_id: i64,
    pub ql_query: String,
    pub page: u32,
    pub ascending: bool,
    pub results_per_page: u32,
}

impl NavlistQuery {
    pub fn new(object_schema_id: i64, object_type_id: i64, ql_query: impl Into<String>) -> Self {
        Self {
            object_schema_id,
            object_type_id,
            ql_query: ql_query.into(),
            page: 1,
            ascending: true,
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn results_per_page(mut self, results: u32) -> Self {
        self.results_per_page = results.max(1);
        self
    }

    /// The JSON request body.
    pub fn to_body(&self) -> Value {
        json!({
            "objectTypeId": self.object_type_id,
            "attributesToDisplay": { "attributesToDisplayIds": [] },
            "page": self.page,
            "asc": if self.ascending { 1 } else { 0 },
            "resultsPerPage": self.results_per_page,
            "includeAttributes": false,
            "objectSchemaId": self.object_schema_id,
            "qlQuery": self.ql_query,
        })
    }
}
