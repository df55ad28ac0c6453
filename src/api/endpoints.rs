//! Insight resource operations.
//!
//! Schemas, object types, IQL/AQL queries, objects and the Data-Center-only
//! admin endpoints. Payloads that callers usually pass through untouched
//! (history, reference info, icons, comments) are returned as raw JSON.

use std::path::Path;

use reqwest::{multipart, Method};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::client::InsightClient;
use super::error::{ApiError, Result};
use super::query::{AttributeQuery, IqlQuery, NavlistQuery};
use super::types::{
    InsightObject, ObjectAttribute, ObjectCollection, ObjectPage, ObjectPayload, ObjectSchema,
    ObjectSchemaList, ObjectType, ObjectTypeAttribute, StatusType,
};

fn params(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl InsightClient {
    // Schemas

    /// List all object schemas.
    #[instrument(skip(self))]
    pub async fn get_object_schemas(&self) -> Result<Vec<ObjectSchema>> {
        let list: ObjectSchemaList = self.get("objectschema/list", &[]).await?;
        debug!("Found {} object schemas", list.object_schemas.len());
        Ok(list.object_schemas)
    }

    /// Get one object schema.
    #[instrument(skip(self))]
    pub async fn get_object_schema(&self, schema_id: i64) -> Result<ObjectSchema> {
        self.get(&format!("objectschema/{}", schema_id), &[])
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => {
                    ApiError::NotFound(format!("Object schema {} not found", schema_id))
                }
                e => e,
            })
    }

    /// List the object types of a schema.
    #[instrument(skip(self))]
    pub async fn get_object_schema_object_types(&self, schema_id: i64) -> Result<Vec<ObjectType>> {
        self.get(&format!("objectschema/{}/objecttypes", schema_id), &[])
            .await
    }

    /// List the object types of a schema as a flat list, including nested types.
    #[instrument(skip(self))]
    pub async fn get_object_schema_object_types_flat(
        &self,
        schema_id: i64,
    ) -> Result<Vec<ObjectType>> {
        self.get(&format!("objectschema/{}/objecttypes/flat", schema_id), &[])
            .await
    }

    /// List the attributes of every object type in a schema.
    ///
    /// Only the filters that are set are sent.
    #[instrument(skip(self, query))]
    pub async fn get_object_schema_attributes(
        &self,
        schema_id: i64,
        query: &AttributeQuery,
    ) -> Result<Vec<ObjectTypeAttribute>> {
        self.get(
            &format!("objectschema/{}/attributes", schema_id),
            &query.set_params(),
        )
        .await
    }

    // Object types

    /// List the attributes of one object type.
    ///
    /// Every flag is sent; see [`AttributeQuery::for_object_type`] for the
    /// usual defaults.
    #[instrument(skip(self, query))]
    pub async fn get_object_type_attributes(
        &self,
        object_type_id: i64,
        query: &AttributeQuery,
    ) -> Result<Vec<ObjectTypeAttribute>> {
        self.get(
            &format!("objecttype/{}/attributes", object_type_id),
            &query.all_params(),
        )
        .await
    }

    // Queries

    /// Run one page of an IQL query.
    #[instrument(skip(self, query), fields(iql = %query.query, page = query.page))]
    pub async fn iql(&self, query: &IqlQuery) -> Result<ObjectPage> {
        let page: ObjectPage = self.get("iql/objects", &query.to_params("iql")).await?;
        debug!(
            "IQL page {}/{}: {} objects (total: {})",
            page.page_number,
            page.page_size,
            page.object_entries.len(),
            page.total_filter_count
        );
        Ok(page)
    }

    /// Run one page of an AQL query.
    #[instrument(skip(self, query), fields(aql = %query.query, page = query.page))]
    pub async fn aql(&self, query: &IqlQuery) -> Result<ObjectPage> {
        self.get("aql/objects", &query.to_params("qlQuery")).await
    }

    /// Run an IQL query and collect the objects of every page.
    ///
    /// Pages after the first are fetched concurrently. `max_pages` caps the
    /// number of pages fetched.
    #[instrument(skip(self, query), fields(iql = %query.query))]
    pub async fn iql_all(
        &self,
        query: &IqlQuery,
        max_pages: Option<u32>,
    ) -> Result<ObjectCollection> {
        let collection = self
            .collect_pages(max_pages, |page| {
                let query = query.clone().page(page);
                async move { self.iql(&query).await }
            })
            .await?;
        info!(
            "IQL query returned {} objects in {} pages",
            collection.objects.len(),
            collection.pages_fetched
        );
        Ok(collection)
    }

    /// Run an AQL query and collect the objects of every page.
    #[instrument(skip(self, query), fields(aql = %query.query))]
    pub async fn aql_all(
        &self,
        query: &IqlQuery,
        max_pages: Option<u32>,
    ) -> Result<ObjectCollection> {
        self.collect_pages(max_pages, |page| {
            let query = query.clone().page(page);
            async move { self.aql(&query).await }
        })
        .await
    }

    /// Run one page of an AQL query through the object navigator list.
    #[instrument(skip(self, query), fields(aql = %query.ql_query, page = query.page))]
    pub async fn get_objects_by_aql(&self, query: &NavlistQuery) -> Result<ObjectPage> {
        debug!("Sending navlist AQL query");
        self.search("object/navlist/aql", &query.to_body()).await
    }

    /// Run a navigator list AQL query and collect every page.
    pub async fn get_objects_by_aql_all(
        &self,
        query: &NavlistQuery,
        max_pages: Option<u32>,
    ) -> Result<ObjectCollection> {
        self.collect_pages(max_pages, |page| {
            let query = query.clone().page(page);
            async move { self.get_objects_by_aql(&query).await }
        })
        .await
    }

    // Objects

    /// Get one object.
    #[instrument(skip(self))]
    pub async fn get_object(&self, object_id: i64) -> Result<InsightObject> {
        self.get(&format!("object/{}", object_id), &[])
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => {
                    ApiError::NotFound(format!("Object {} not found", object_id))
                }
                e => e,
            })
    }

    /// Create an object.
    #[instrument(skip(self, payload), fields(object_type_id = payload.object_type_id))]
    pub async fn create_object(&self, payload: &ObjectPayload) -> Result<InsightObject> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode object: {}", e)))?;
        let object: InsightObject = self
            .send(Method::POST, "object/create", &[], Some(&body))
            .await?;
        info!(object_key = %object.object_key, "Created object");
        Ok(object)
    }

    /// Replace the given attributes of an object.
    #[instrument(skip(self, payload))]
    pub async fn update_object(
        &self,
        object_id: i64,
        payload: &ObjectPayload,
    ) -> Result<InsightObject> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode object: {}", e)))?;
        let resource = format!("object/{}", object_id);
        let object = self.send(Method::PUT, &resource, &[], Some(&body)).await?;
        self.invalidate(&resource).await;
        Ok(object)
    }

    /// Delete an object.
    #[instrument(skip(self))]
    pub async fn delete_object(&self, object_id: i64) -> Result<()> {
        let resource = format!("object/{}", object_id);
        let _: Value = self.send(Method::DELETE, &resource, &[], None).await?;
        self.invalidate(&resource).await;
        info!("Deleted object");
        Ok(())
    }

    /// Get the attributes of an object.
    #[instrument(skip(self))]
    pub async fn get_object_attributes(&self, object_id: i64) -> Result<Vec<ObjectAttribute>> {
        self.get(&format!("object/{}/attributes", object_id), &[])
            .await
    }

    /// Get the change history of an object.
    #[instrument(skip(self))]
    pub async fn get_object_history(
        &self,
        object_id: i64,
        ascending: bool,
        abbreviate: bool,
    ) -> Result<Value> {
        self.get(
            &format!("object/{}/history", object_id),
            &params(&[
                ("asc", ascending.to_string()),
                ("abbreviate", abbreviate.to_string()),
            ]),
        )
        .await
    }

    /// Get the inbound/outbound reference summary of an object.
    #[instrument(skip(self))]
    pub async fn get_object_reference_info(&self, object_id: i64) -> Result<Value> {
        self.get(&format!("object/{}/referenceinfo", object_id), &[])
            .await
    }

    // Configuration

    /// List status types, either global ones or those of a schema.
    #[instrument(skip(self))]
    pub async fn get_status_types(&self, object_schema_id: Option<i64>) -> Result<Vec<StatusType>> {
        let query = match object_schema_id {
            Some(id) => params(&[("objectSchemaId", id.to_string())]),
            None => Vec::new(),
        };
        self.get("config/statustype", &query).await
    }

    /// Get one icon.
    pub async fn get_icon(&self, icon_id: i64) -> Result<Value> {
        self.get(&format!("icon/{}", icon_id), &[]).await
    }

    /// List the global icons.
    pub async fn get_global_icons(&self) -> Result<Value> {
        self.get("icon/global", &[]).await
    }

    /// Start an import configuration.
    #[instrument(skip(self))]
    pub async fn start_import(&self, import_id: &str) -> Result<Value> {
        let resource = format!("import/start/{}", urlencoding::encode(import_id));
        self.send(Method::POST, &resource, &[], None).await
    }

    // Data Center only

    /// List the attachments of an object.
    pub async fn get_attachments(&self, object_id: i64) -> Result<Value> {
        self.require_data_center()?;
        self.get(&format!("attachments/object/{}", object_id), &[])
            .await
    }

    /// Upload a file as an attachment of an object.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn upload_attachment(&self, object_id: i64, path: impl AsRef<Path>) -> Result<Value> {
        self.require_data_center()?;
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        info!("Adding attachment {}", file_name);
        let contents = tokio::fs::read(path).await?;
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(contents).file_name(file_name));

        let resource = format!("attachments/object/{}", object_id);
        let value = self.send_multipart(&resource, form).await?;
        self.invalidate(&resource).await;
        Ok(value)
    }

    /// Delete an attachment.
    #[instrument(skip(self))]
    pub async fn delete_attachment(&self, attachment_id: i64) -> Result<Value> {
        self.require_data_center()?;
        info!("Deleting attachment");
        self.send(
            Method::DELETE,
            &format!("attachments/{}", attachment_id),
            &[],
            None,
        )
        .await
    }

    /// Add a comment to an object, visible to the given role.
    #[instrument(skip(self, comment))]
    pub async fn add_comment(&self, object_id: i64, comment: &str, role: i64) -> Result<Value> {
        self.require_data_center()?;
        let query = params(&[
            ("comment", comment.to_string()),
            ("objectId", object_id.to_string()),
            ("role", role.to_string()),
        ]);
        let value = self
            .send(Method::POST, "comment/create", &query, None)
            .await?;
        self.invalidate(&format!("comment/object/{}", object_id))
            .await;
        Ok(value)
    }

    /// List the comments of an object.
    pub async fn get_comments(&self, object_id: i64) -> Result<Value> {
        self.require_data_center()?;
        self.get(&format!("comment/object/{}", object_id), &[])
            .await
    }

    /// Start a full reindex of Insight.
    #[instrument(skip(self))]
    pub async fn reindex(&self) -> Result<Value> {
        self.require_data_center()?;
        self.send(Method::POST, "index/reindex/start", &[], None)
            .await
    }

    /// Start a reindex of the current cluster node.
    #[instrument(skip(self))]
    pub async fn reindex_current_node(&self) -> Result<Value> {
        self.require_data_center()?;
        self.send(Method::POST, "index/reindex/currentnode", &[], None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::types::AttributeInput;
    use crate::api::ClientOptions;
    use crate::test_utils::{mock_client, mock_client_with, object_page, test_options};

    const ROOT: &str = "/rest/insight/1.0";

    async fn mount_iql_page(server: &MockServer, page: u32, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("{}/iql/objects", ROOT)))
            .and(query_param("page", page.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_object_schemas() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/objectschema/list", ROOT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objectschemas": [
                    {"id": 8, "name": "ITSM", "objectSchemaKey": "ITSM", "objectCount": 1200},
                    {"id": 9, "name": "HR", "objectSchemaKey": "HR"}
                ]
            })))
            .mount(&server)
            .await;

        let schemas = mock_client(&server).get_object_schemas().await.unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].object_count, Some(1200));
        assert_eq!(schemas[1].object_schema_key, "HR");
    }

    #[tokio::test]
    async fn test_get_object_schema_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = mock_client(&server).get_object_schema(99).await.unwrap_err();
        assert_eq!(err.to_string(), "Resource not found: Object schema 99 not found");
    }

    #[tokio::test]
    async fn test_schema_attributes_send_only_set_flags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/objectschema/8/attributes", ROOT)))
            .and(query_param("orderByName", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 70, "name": "Name", "label": true}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let query = AttributeQuery {
            order_by_name: true,
            ..AttributeQuery::default()
        };
        let attributes = mock_client(&server)
            .get_object_schema_attributes(8, &query)
            .await
            .unwrap();

        assert_eq!(attributes[0].name, "Name");
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("orderByName=true"));
    }

    #[tokio::test]
    async fn test_object_type_attributes_include_children() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/objecttype/7/attributes", ROOT)))
            .and(query_param("includeChildren", "true"))
            .and(query_param("onlyValueEditable", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let attributes = mock_client(&server)
            .get_object_type_attributes(7, &AttributeQuery::for_object_type())
            .await
            .unwrap();
        assert!(attributes.is_empty());
    }

    #[tokio::test]
    async fn test_iql_single_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/iql/objects", ROOT)))
            .and(query_param("iql", "objectType = \"Physical Host\""))
            .and(query_param("objectSchemaId", "8"))
            .and(query_param("resultPerPage", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_page(1, 1, 3)))
            .expect(1)
            .mount(&server)
            .await;

        let query = IqlQuery::new("objectType = \"Physical Host\"")
            .schema(8)
            .results_per_page(10);
        let page = mock_client(&server).iql(&query).await.unwrap();

        assert_eq!(page.object_entries.len(), 3);
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_iql_all_stops_at_last_reported_page() {
        let server = MockServer::start().await;
        for page in 1..=4 {
            mount_iql_page(&server, page, object_page(page, 4, 2)).await;
        }
        // Nothing beyond page 4 may be requested.
        Mock::given(method("GET"))
            .and(query_param("page", "5"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let collection = mock_client(&server)
            .iql_all(&IqlQuery::new("Name like host").results_per_page(2), None)
            .await
            .unwrap();

        assert_eq!(collection.pages_fetched, 4);
        assert_eq!(collection.total_filter_count, 8);
        let ids: Vec<i64> = collection.objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_iql_all_respects_max_pages() {
        let server = MockServer::start().await;
        for page in 1..=2 {
            mount_iql_page(&server, page, object_page(page, 10, 1)).await;
        }

        let collection = mock_client(&server)
            .iql_all(&IqlQuery::new("Name like host"), Some(2))
            .await
            .unwrap();

        assert_eq!(collection.pages_fetched, 2);
        assert_eq!(collection.objects.len(), 2);
    }

    #[tokio::test]
    async fn test_iql_all_failing_page_raises_page_fetch_error() {
        let server = MockServer::start().await;
        mount_iql_page(&server, 1, object_page(1, 3, 2)).await;
        Mock::given(method("GET"))
            .and(path(format!("{}/iql/objects", ROOT)))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"errorMessages": ["No access to schema"]})),
            )
            .mount(&server)
            .await;

        let options = ClientOptions {
            page_concurrency: 1,
            ..test_options()
        };
        let err = mock_client_with(&server, options)
            .iql_all(&IqlQuery::new("Name like host"), None)
            .await
            .unwrap_err();

        assert_eq!(err.failed_page(), Some(2));
        assert!(matches!(
            err,
            ApiError::PageFetch { ref source, .. } if matches!(**source, ApiError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_aql_uses_ql_query_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/aql/objects", ROOT)))
            .and(query_param("qlQuery", "Name = web-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_page(1, 1, 1)))
            .expect(1)
            .mount(&server)
            .await;

        let page = mock_client(&server)
            .aql(&IqlQuery::new("Name = web-01"))
            .await
            .unwrap();
        assert_eq!(page.object_entries[0].object_key, "ITSM-1");
    }

    #[tokio::test]
    async fn test_navlist_aql_posts_body() {
        let server = MockServer::start().await;
        let query = NavlistQuery::new(8, 7, "Name like web");
        Mock::given(method("POST"))
            .and(path(format!("{}/object/navlist/aql", ROOT)))
            .and(body_json(query.to_body()))
            .respond_with(ResponseTemplate::new(200).set_body_json(object_page(1, 1, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let page = mock_client(&server)
            .get_objects_by_aql(&query)
            .await
            .unwrap();
        assert_eq!(page.object_entries.len(), 2);
    }

    #[tokio::test]
    async fn test_update_object_invalidates_cached_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/object/101", ROOT)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 101, "label": "old"})),
            )
            .expect(2)
            .mount(&server)
            .await;
        let payload = ObjectPayload::new(7, vec![AttributeInput::new(70, ["new"])]);
        Mock::given(method("PUT"))
            .and(path(format!("{}/object/101", ROOT)))
            .and(body_json(serde_json::to_value(&payload).unwrap()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 101, "label": "new"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        client.get_object(101).await.unwrap();
        let updated = client.update_object(101, &payload).await.unwrap();
        assert_eq!(updated.label, "new");

        // The cached GET was dropped, so this goes to the server again.
        client.get_object(101).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_delete_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/object/create", ROOT)))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 500, "label": "web-02", "objectKey": "ITSM-500"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/object/500", ROOT)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let created = client
            .create_object(&ObjectPayload::new(7, vec![AttributeInput::new(70, ["web-02"])]))
            .await
            .unwrap();
        assert_eq!(created.object_key, "ITSM-500");

        client.delete_object(created.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_object_is_attempted_once_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/object/create", ROOT)))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = mock_client(&server)
            .create_object(&ObjectPayload::new(7, vec![AttributeInput::new(70, ["web-03"])]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServerError(_)));
    }

    #[tokio::test]
    async fn test_create_object_is_resent_when_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/object/create", ROOT)))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/object/create", ROOT)))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 501, "objectKey": "ITSM-501"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = mock_client(&server)
            .create_object(&ObjectPayload::new(7, vec![AttributeInput::new(70, ["web-03"])]))
            .await
            .unwrap();
        assert_eq!(created.object_key, "ITSM-501");
    }

    #[tokio::test]
    async fn test_object_history_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/object/5/history", ROOT)))
            .and(query_param("asc", "false"))
            .and(query_param("abbreviate", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let history = mock_client(&server)
            .get_object_history(5, false, true)
            .await
            .unwrap();
        assert_eq!(history, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_status_types_for_schema() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/config/statustype", ROOT)))
            .and(query_param("objectSchemaId", "8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "Running", "category": 1}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let statuses = mock_client(&server).get_status_types(Some(8)).await.unwrap();
        assert_eq!(statuses[0].name, "Running");
    }

    #[tokio::test]
    async fn test_add_comment_sends_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/comment/create", ROOT)))
            .and(query_param("comment", "rebooted"))
            .and(query_param("objectId", "5"))
            .and(query_param("role", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let value = mock_client(&server)
            .add_comment(5, "rebooted", 0)
            .await
            .unwrap();
        assert_eq!(value["id"], 9);
    }

    #[tokio::test]
    async fn test_upload_attachment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/attachments/object/5", ROOT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"rack diagram").unwrap();

        let value = mock_client(&server)
            .upload_attachment(5, file.path())
            .await
            .unwrap();
        assert_eq!(value["id"], 3);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("rack diagram"));
        assert_eq!(
            requests[0].headers.get("x-atlassian-token").unwrap(),
            "no-check"
        );
    }

    #[tokio::test]
    async fn test_data_center_only_operations_fail_on_cloud() {
        let server = MockServer::start().await;
        let options = ClientOptions {
            cloud: true,
            ..test_options()
        };
        let client = mock_client_with(&server, options);

        assert!(matches!(
            client.get_attachments(1).await,
            Err(ApiError::Unsupported(_))
        ));
        assert!(matches!(client.reindex().await, Err(ApiError::Unsupported(_))));
        assert!(matches!(
            client.add_comment(1, "x", 0).await,
            Err(ApiError::Unsupported(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
