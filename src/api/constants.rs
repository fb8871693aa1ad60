//! ERPNext (Frappe) REST API paths and names

/// Path prefix for document resources
pub const RESOURCE_PATH: &str = "/api/resource";

/// Path prefix for whitelisted server methods
pub const METHOD_PATH: &str = "/api/method";

/// Server methods used by the client
pub mod methods {
    pub const LOGGED_USER: &str = "frappe.auth.get_logged_user";
    pub const UPLOAD_FILE: &str = "upload_file";
}

/// Doctypes used besides the imported entities
pub mod doctypes {
    pub const CUSTOM_FIELD: &str = "Custom Field";
    pub const ITEM_PRICE: &str = "Item Price";
    pub const FILE: &str = "File";
}

/// Custom field types that carry no data
pub const LAYOUT_FIELD_TYPES: [&str; 6] = [
    "Section Break",
    "Column Break",
    "Tab Break",
    "HTML",
    "Heading",
    "Button",
];

pub const USER_AGENT: &str = concat!("catalog-sync/", env!("CARGO_PKG_VERSION"));

/// Build a resource collection URL
pub fn resource_endpoint(base_url: &str, doctype: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        RESOURCE_PATH,
        urlencoding::encode(doctype)
    )
}

/// Build a single document URL
pub fn document_endpoint(base_url: &str, doctype: &str, name: &str) -> String {
    format!(
        "{}/{}",
        resource_endpoint(base_url, doctype),
        urlencoding::encode(name)
    )
}

/// Build a server method URL
pub fn method_endpoint(base_url: &str, method: &str) -> String {
    format!("{}{}/{}", base_url.trim_end_matches('/'), METHOD_PATH, method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_encode_names() {
        assert_eq!(
            resource_endpoint("https://erp.example.com/", "Item Group"),
            "https://erp.example.com/api/resource/Item%20Group"
        );
        assert_eq!(
            document_endpoint("https://erp.example.com", "Item", "ART/1 B"),
            "https://erp.example.com/api/resource/Item/ART%2F1%20B"
        );
        assert_eq!(
            method_endpoint("https://erp.example.com", methods::UPLOAD_FILE),
            "https://erp.example.com/api/method/upload_file"
        );
    }
}
