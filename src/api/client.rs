use super::constants::{
    LAYOUT_FIELD_TYPES, USER_AGENT, doctypes, document_endpoint, method_endpoint, methods,
    resource_endpoint,
};
use super::error::{RemoteError, extract_error_message};
use super::remote::{RecordFields, RemoteCatalog};
use crate::catalog::{FieldDescriptor, FieldKind, SourceEntity};
use crate::config::ImporterConfig;
use crate::transform::barcode::{barcode_type, is_valid_barcode};
use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// ERPNext REST API client with connection pooling
pub struct ErpNextClient {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    default_item_group: String,
    default_price_list: String,
    currency: String,
}

impl ErpNextClient {
    pub fn new(config: &ImporterConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_http_client(config, http_client))
    }

    /// Create a client around a custom HTTP client
    pub fn with_http_client(config: &ImporterConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: config.auth_header(),
            default_item_group: config.default_item_group.clone(),
            default_price_list: config.default_price_list.clone(),
            currency: config.currency.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Response status: {}", status);

        if !status.is_success() {
            let message = extract_error_message(status.as_u16(), &body);
            return Err(RemoteError::http(status.as_u16(), message));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    /// Fetch a document, `None` on 404
    async fn get_document(&self, doctype: &str, name: &str) -> Result<Option<Value>, RemoteError> {
        let url = document_endpoint(&self.base_url, doctype, name);
        match self.send(self.http_client.get(url)).await {
            Ok(response) => Ok(response.get("data").cloned()),
            Err(RemoteError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert_document(&self, doctype: &str, body: &RecordFields) -> Result<Value, RemoteError> {
        let url = resource_endpoint(&self.base_url, doctype);
        self.send(self.http_client.post(url).json(body)).await
    }

    async fn create_item_price(&self, item_code: &str, rate: f64) -> Result<(), RemoteError> {
        let body = json!({
            "doctype": doctypes::ITEM_PRICE,
            "item_code": item_code,
            "price_list": self.default_price_list,
            "price_list_rate": rate,
            "currency": self.currency,
            "selling": 1,
        });
        let url = resource_endpoint(&self.base_url, doctypes::ITEM_PRICE);
        self.send(self.http_client.post(url).json(&body)).await?;
        debug!("Item Price {} {} created for {}", rate, self.currency, item_code);
        Ok(())
    }

    async fn insert_item(&self, body: RecordFields, price: Option<f64>) -> Result<String, RemoteError> {
        let response = self.insert_document(SourceEntity::Item.doctype(), &body).await?;
        let name = document_name(&response)
            .or_else(|| body.get("item_code").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| RemoteError::InvalidResponse("created item has no name".into()))?;

        if let Some(rate) = price {
            // Item already exists; price failures are only logged.
            if let Err(e) = self.create_item_price(&name, rate).await {
                warn!("Item {} created but Item Price failed: {}", name, e);
            }
        }
        Ok(name)
    }

    async fn create_variant(&self, fields: &RecordFields) -> Result<String, RemoteError> {
        let template_code = fields
            .get("variant_of")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        let template = self
            .get_document(SourceEntity::Item.doctype(), template_code)
            .await?
            .ok_or_else(|| RemoteError::Rejected(format!("template item '{}' not found", template_code)))?;

        let (body, price) = self.variant_create_payload(&template, fields)?;
        self.insert_item(body, price).await
    }

    /// Body for creating a variant of `template`.
    ///
    /// The template must have `has_variants` set. Group and unit are taken
    /// from the template unless given; a missing name becomes the template
    /// name followed by the attribute values.
    pub fn variant_create_payload(
        &self,
        template: &Value,
        fields: &RecordFields,
    ) -> Result<(RecordFields, Option<f64>), RemoteError> {
        let template_code = template.get("name").and_then(Value::as_str).unwrap_or_default();
        let has_variants = template
            .get("has_variants")
            .is_some_and(|v| v.as_i64() == Some(1) || v.as_bool() == Some(true));
        if !has_variants {
            return Err(RemoteError::Rejected(format!(
                "item '{}' is not a variant template",
                template_code
            )));
        }

        let mut fields = fields.clone();
        for key in ["item_group", "stock_uom"] {
            let missing = fields.get(key).is_none_or(Value::is_null);
            if let Some(value) = template.get(key).filter(|v| missing && !v.is_null()) {
                fields.insert(key.to_string(), value.clone());
            }
        }

        let has_name = fields
            .get("item_name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            let values: Vec<&str> = fields
                .get("attributes")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| row.get("attribute_value").and_then(Value::as_str))
                        .collect()
                })
                .unwrap_or_default();
            let base = template.get("item_name").and_then(Value::as_str).unwrap_or(template_code);
            fields.insert("item_name".to_string(), json!(format!("{} - {}", base, values.join(" / "))));
        }

        Ok(self.item_create_payload(&fields))
    }

    /// Body for creating an item, plus the net price to store as Item Price.
    ///
    /// A valid GTIN becomes a barcode row; invalid ones are dropped. Null
    /// values are not sent.
    pub fn item_create_payload(&self, fields: &RecordFields) -> (RecordFields, Option<f64>) {
        let mut body = fields.clone();
        body.retain(|_, v| !v.is_null());
        body.remove("barcode");

        let price = body.remove("standard_rate").and_then(|v| v.as_f64());

        if let Some(gtin) = body.remove("gtin") {
            match gtin.as_str().map(str::trim) {
                Some(code) if is_valid_barcode(code) => {
                    body.insert(
                        "barcodes".to_string(),
                        json!([{ "barcode": code, "barcode_type": barcode_type(code) }]),
                    );
                }
                _ => warn!("Dropping invalid GTIN {}", gtin),
            }
        }

        body.insert("doctype".to_string(), json!(SourceEntity::Item.doctype()));
        body.insert("is_sales_item".to_string(), json!(1));
        body.insert("is_purchase_item".to_string(), json!(1));
        body.entry("item_group")
            .or_insert_with(|| json!(self.default_item_group));

        (body, price)
    }

    /// Body for updating an existing record; variant links cannot change
    pub fn update_payload(fields: &RecordFields) -> RecordFields {
        let mut body = fields.clone();
        body.retain(|_, v| !v.is_null());
        for key in ["doctype", "item_code", "gtin", "barcode", "variant_of", "attributes"] {
            body.remove(key);
        }
        body
    }
}

fn attribute_value_row(value: &str) -> Value {
    let abbr: String = value.chars().take(3).collect::<String>().to_uppercase();
    json!({ "attribute_value": value, "abbr": abbr })
}

/// Comma separated values of an attribute record
fn attribute_values(fields: &RecordFields) -> Vec<String> {
    fields
        .get("attribute_values")
        .and_then(Value::as_str)
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn is_numeric_attribute(fields: &RecordFields) -> bool {
    fields
        .get("numeric_values")
        .is_some_and(|v| v.as_i64() == Some(1) || v.as_bool() == Some(true))
}

/// Body for creating an `Item Attribute`.
///
/// Numeric attributes with a start value get a range (to 100 in steps of 1
/// unless given); others get one row per listed value.
pub fn attribute_create_payload(fields: &RecordFields) -> RecordFields {
    let numeric = is_numeric_attribute(fields);
    let mut body = RecordFields::new();
    body.insert("doctype".to_string(), json!(SourceEntity::ItemAttribute.doctype()));
    if let Some(name) = fields.get("attribute_name") {
        body.insert("attribute_name".to_string(), name.clone());
    }
    body.insert("numeric_values".to_string(), json!(u8::from(numeric)));

    let from = fields.get("from_range").and_then(Value::as_f64).filter(|_| numeric);
    if let Some(from) = from {
        let to = fields.get("to_range").and_then(Value::as_f64).unwrap_or(100.0);
        let increment = fields.get("increment").and_then(Value::as_f64).unwrap_or(1.0);
        body.insert("from_range".to_string(), json!(from));
        body.insert("to_range".to_string(), json!(to));
        body.insert("increment".to_string(), json!(increment));
    } else {
        let values = attribute_values(fields);
        if !values.is_empty() {
            let rows: Vec<Value> = values.iter().map(|v| attribute_value_row(v)).collect();
            body.insert("item_attribute_values".to_string(), Value::Array(rows));
        }
    }
    body
}

/// Body for updating an `Item Attribute`: listed values missing on the
/// remote record (compared case-insensitively) are appended to its rows
pub fn attribute_update_payload(current: &Value, fields: &RecordFields) -> RecordFields {
    let mut rows: Vec<Value> = current
        .get("item_attribute_values")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let known: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get("attribute_value").and_then(Value::as_str))
        .map(str::to_lowercase)
        .collect();

    let before = rows.len();
    for value in attribute_values(fields) {
        if !known.contains(&value.to_lowercase()) {
            rows.push(attribute_value_row(&value));
        }
    }

    let mut body = RecordFields::new();
    if rows.len() > before {
        body.insert("item_attribute_values".to_string(), Value::Array(rows));
    }
    for key in ["numeric_values", "from_range", "to_range", "increment"] {
        if let Some(value) = fields.get(key).filter(|v| !v.is_null()) {
            body.insert(key.to_string(), value.clone());
        }
    }
    body
}

/// Custom fields from a `Custom Field` listing; layout-only fields skipped
pub fn parse_custom_fields(entity: SourceEntity, response: &Value) -> Vec<FieldDescriptor> {
    response
        .get("data")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let name = row.get("fieldname")?.as_str()?.trim();
                    let fieldtype = row.get("fieldtype").and_then(Value::as_str).unwrap_or("Data");
                    if name.is_empty() || LAYOUT_FIELD_TYPES.contains(&fieldtype) {
                        return None;
                    }
                    let label = row
                        .get("label")
                        .and_then(Value::as_str)
                        .filter(|l| !l.trim().is_empty())
                        .unwrap_or(name);

                    let mut field = FieldDescriptor::new(
                        name,
                        label,
                        FieldKind::from_remote_type(fieldtype),
                        entity,
                    )
                    .custom();
                    field.required = row.get("reqd").and_then(Value::as_i64) == Some(1);
                    Some(field)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Names of the `File` documents in a listing
fn attachment_names(response: &Value) -> Vec<String> {
    response
        .get("data")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn document_name(response: &Value) -> Option<String> {
    response
        .get("data")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl RemoteCatalog for ErpNextClient {
    async fn check_connection(&self) -> Result<String, RemoteError> {
        let url = method_endpoint(&self.base_url, methods::LOGGED_USER);
        let response = self.send(self.http_client.get(url)).await?;
        let user = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        info!("Connected to {} as {}", self.base_url, user);
        Ok(user)
    }

    async fn exists(
        &self,
        entity: SourceEntity,
        natural_key: &str,
    ) -> Result<Option<String>, RemoteError> {
        Ok(self
            .get_document(entity.doctype(), natural_key)
            .await?
            .and_then(|doc| doc.get("name").and_then(Value::as_str).map(str::to_string)))
    }

    async fn create(&self, entity: SourceEntity, fields: &RecordFields) -> Result<String, RemoteError> {
        match entity {
            SourceEntity::Item => {
                let (body, price) = self.item_create_payload(fields);
                self.insert_item(body, price).await
            }
            SourceEntity::ItemVariant => self.create_variant(fields).await,
            SourceEntity::ItemGroup => {
                let mut body = fields.clone();
                body.retain(|_, v| !v.is_null());
                body.insert("doctype".to_string(), json!(entity.doctype()));
                body.insert("is_group".to_string(), json!(1));
                body.entry("parent_item_group")
                    .or_insert_with(|| json!(self.default_item_group));

                let response = self.insert_document(entity.doctype(), &body).await?;
                document_name(&response)
                    .or_else(|| {
                        body.get("item_group_name")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .ok_or_else(|| RemoteError::InvalidResponse("created group has no name".into()))
            }
            SourceEntity::ItemAttribute => {
                let body = attribute_create_payload(fields);
                let response = self.insert_document(entity.doctype(), &body).await?;
                document_name(&response)
                    .or_else(|| body.get("attribute_name").and_then(Value::as_str).map(str::to_string))
                    .ok_or_else(|| RemoteError::InvalidResponse("created attribute has no name".into()))
            }
        }
    }

    async fn update(
        &self,
        entity: SourceEntity,
        id: &str,
        fields: &RecordFields,
    ) -> Result<(), RemoteError> {
        let body = match entity {
            SourceEntity::ItemAttribute => {
                let current = self.get_document(entity.doctype(), id).await?.unwrap_or(Value::Null);
                attribute_update_payload(&current, fields)
            }
            _ => Self::update_payload(fields),
        };
        let url = document_endpoint(&self.base_url, entity.doctype(), id);
        self.send(self.http_client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn find_category(&self, label: &str) -> Result<Option<String>, RemoteError> {
        self.exists(SourceEntity::ItemGroup, label).await
    }

    async fn create_category(
        &self,
        parent_id: Option<&str>,
        label: &str,
    ) -> Result<String, RemoteError> {
        let mut fields = RecordFields::new();
        fields.insert("item_group_name".to_string(), json!(label));
        if let Some(parent) = parent_id {
            fields.insert("parent_item_group".to_string(), json!(parent));
        }
        self.create(SourceEntity::ItemGroup, &fields).await
    }

    async fn upload_image(
        &self,
        target_id: &str,
        file: &Path,
        is_primary: bool,
    ) -> Result<(), RemoteError> {
        let read_error = |message: String| RemoteError::File {
            path: file.display().to_string(),
            message,
        };
        let bytes = tokio::fs::read(file).await.map_err(|e| read_error(e.to_string()))?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| read_error("invalid file name".to_string()))?
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_type(file))
            .map_err(|e| read_error(e.to_string()))?;
        let doctype = SourceEntity::Item.doctype();
        let form = Form::new()
            .text("is_private", "0")
            .text("folder", "Home/Attachments")
            .text("doctype", doctype)
            .text("docname", target_id.to_string())
            .text("attached_to_doctype", doctype)
            .text("attached_to_name", target_id.to_string())
            .part("file", part);

        let url = method_endpoint(&self.base_url, methods::UPLOAD_FILE);
        let response = self
            .send(self.http_client.post(url).timeout(UPLOAD_TIMEOUT).multipart(form))
            .await?;
        let file_url = response
            .get("message")
            .and_then(|m| m.get("file_url"))
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::InvalidResponse("upload returned no file_url".into()))?
            .to_string();
        debug!("Uploaded {} for {} -> {}", file.display(), target_id, file_url);

        if is_primary {
            let url = document_endpoint(&self.base_url, doctype, target_id);
            self.send(self.http_client.put(url).json(&json!({ "image": file_url })))
                .await?;
        }
        Ok(())
    }

    async fn delete_attachments(&self, target_id: &str) -> Result<usize, RemoteError> {
        let doctype = SourceEntity::Item.doctype();
        let filters = json!([
            ["attached_to_doctype", "=", doctype],
            ["attached_to_name", "=", target_id],
        ])
        .to_string();
        let url = resource_endpoint(&self.base_url, doctypes::FILE);
        let request = self.http_client.get(url).query(&[
            ("fields", r#"["name"]"#),
            ("filters", filters.as_str()),
            ("limit_page_length", "0"),
        ]);
        let response = self.send(request).await?;

        let names = attachment_names(&response);
        for name in &names {
            let url = document_endpoint(&self.base_url, doctypes::FILE, name);
            match self.send(self.http_client.delete(url)).await {
                Ok(_) | Err(RemoteError::Http { status: 404, .. }) => {}
                Err(e) => return Err(e),
            }
            debug!("Deleted attachment {} of {}", name, target_id);
        }

        let url = document_endpoint(&self.base_url, doctype, target_id);
        self.send(self.http_client.put(url).json(&json!({ "image": "" })))
            .await?;
        Ok(names.len())
    }

    async fn list_custom_fields(
        &self,
        entity: SourceEntity,
    ) -> Result<Vec<FieldDescriptor>, RemoteError> {
        let filters = json!([["dt", "=", entity.doctype()]]).to_string();
        let url = resource_endpoint(&self.base_url, doctypes::CUSTOM_FIELD);
        let request = self.http_client.get(url).query(&[
            ("fields", r#"["fieldname","label","fieldtype","reqd"]"#),
            ("filters", filters.as_str()),
            ("limit_page_length", "0"),
        ]);

        let response = self.send(request).await?;
        let fields = parse_custom_fields(entity, &response);
        info!("Found {} custom fields for {}", fields.len(), entity.doctype());
        Ok(fields)
    }
}
