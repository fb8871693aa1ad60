//! Built-in target fields per remote entity

use super::{FieldDescriptor, FieldKind, SourceEntity};

/// Synthetic slots holding the category hierarchy of an item.
///
/// These never reach the remote system as fields; the category resolver
/// consumes them and turns them into an `item_group`.
pub const CATEGORY_LEVEL_FIELDS: [&str; 4] = [
    "category_level_1",
    "category_level_2",
    "category_level_3",
    "category_level_4",
];
pub const CATEGORY_PATH_FIELD: &str = "category_path";

/// Whether a field name is one of the synthetic category slots
pub fn is_category_slot(name: &str) -> bool {
    name == CATEGORY_PATH_FIELD || CATEGORY_LEVEL_FIELDS.contains(&name)
}

const ITEM_FIELDS: &[(&str, &str, FieldKind, bool)] = &[
    ("item_code", "Item code", FieldKind::Text, true),
    ("item_name", "Item name", FieldKind::Text, true),
    ("item_group", "Item group", FieldKind::Text, false),
    ("category_level_1", "Category level 1", FieldKind::Text, false),
    ("category_level_2", "Category level 2", FieldKind::Text, false),
    ("category_level_3", "Category level 3", FieldKind::Text, false),
    ("category_level_4", "Category level 4", FieldKind::Text, false),
    ("category_path", "Category path (A > B > C)", FieldKind::Text, false),
    ("description", "Description", FieldKind::Text, false),
    ("description_html", "Description (HTML)", FieldKind::Text, false),
    ("stock_uom", "Stock unit", FieldKind::Text, false),
    ("is_stock_item", "Stock item", FieldKind::Boolean, false),
    ("disabled", "Disabled", FieldKind::Boolean, false),
    ("is_active", "Active (sets disabled)", FieldKind::Boolean, false),
    ("standard_rate", "Standard rate (net)", FieldKind::Number, false),
    ("standard_rate_brutto", "Selling price (gross)", FieldKind::Number, false),
    ("valuation_rate", "Purchase price", FieldKind::Number, false),
    ("gtin", "GTIN/EAN", FieldKind::Text, false),
    ("barcode", "Barcode", FieldKind::Text, false),
    ("manufacturer_part_no", "Manufacturer part number", FieldKind::Text, false),
    ("brand", "Brand", FieldKind::Text, false),
    ("manufacturer", "Manufacturer", FieldKind::Text, false),
    ("weight_per_unit", "Weight (kg)", FieldKind::Number, false),
    ("item_length", "Length (cm)", FieldKind::Number, false),
    ("item_width", "Width (cm)", FieldKind::Number, false),
    ("item_height", "Height (cm)", FieldKind::Number, false),
    ("country_of_origin", "Country of origin", FieldKind::Text, false),
    ("customs_tariff_number", "Customs tariff number", FieldKind::Text, false),
    ("seo_title", "SEO title", FieldKind::Text, false),
    ("seo_meta_description", "SEO meta description", FieldKind::Text, false),
    ("seo_keywords", "SEO keywords", FieldKind::Text, false),
    ("seo_url_slug", "SEO URL slug", FieldKind::Text, false),
    ("delivery_time", "Delivery time", FieldKind::Text, false),
    ("show_in_website", "Show in website", FieldKind::Boolean, false),
    ("has_variants", "Has variants", FieldKind::Boolean, false),
    ("variant_of", "Variant of", FieldKind::Text, false),
    ("jattr_farbe", "Attribute: colour", FieldKind::Text, false),
    ("jattr_material", "Attribute: material", FieldKind::Text, false),
    ("jattr_groesse", "Attribute: size", FieldKind::Text, false),
    ("jattr_regalsystem", "Attribute: shelving system", FieldKind::Text, false),
    ("jattr_fachlast", "Attribute: shelf load", FieldKind::Text, false),
    ("jattr_feldlast", "Attribute: bay load", FieldKind::Text, false),
    ("jattr_gesamtbreite_mm", "Attribute: total width (mm)", FieldKind::Text, false),
    ("jattr_gesamthoehe_mm", "Attribute: total height (mm)", FieldKind::Text, false),
    ("jattr_bauweise", "Attribute: construction", FieldKind::Text, false),
    ("jattr_bodentyp", "Attribute: shelf type", FieldKind::Text, false),
    ("jattr_anzahl_boeden", "Attribute: number of shelves", FieldKind::Text, false),
];

/// Attribute columns of a variant and the remote attribute they fill
pub const VARIANT_ATTRIBUTE_FIELDS: [(&str, &str); 3] = [
    ("attribute_color", "Farbe"),
    ("attribute_size", "Größe"),
    ("attribute_material", "Material"),
];

/// Free attribute columns holding `Name:Value`
pub const VARIANT_FREE_ATTRIBUTE_FIELDS: [&str; 3] = ["attribute_1", "attribute_2", "attribute_3"];

const ITEM_VARIANT_FIELDS: &[(&str, &str, FieldKind, bool)] = &[
    ("item_code", "Variant code", FieldKind::Text, true),
    ("variant_of", "Template item", FieldKind::Text, true),
    ("item_name", "Item name", FieldKind::Text, false),
    ("attribute_color", "Colour", FieldKind::Text, false),
    ("attribute_size", "Size", FieldKind::Text, false),
    ("attribute_material", "Material", FieldKind::Text, false),
    ("attribute_1", "Attribute 1 (Name:Value)", FieldKind::Text, false),
    ("attribute_2", "Attribute 2 (Name:Value)", FieldKind::Text, false),
    ("attribute_3", "Attribute 3 (Name:Value)", FieldKind::Text, false),
    ("standard_rate", "Standard rate (net)", FieldKind::Number, false),
    ("standard_rate_brutto", "Selling price (gross)", FieldKind::Number, false),
    ("gtin", "GTIN/EAN", FieldKind::Text, false),
    ("barcode", "Barcode", FieldKind::Text, false),
    ("disabled", "Disabled", FieldKind::Boolean, false),
    ("is_active", "Active (sets disabled)", FieldKind::Boolean, false),
];

const ITEM_ATTRIBUTE_FIELDS: &[(&str, &str, FieldKind, bool)] = &[
    ("attribute_name", "Attribute name", FieldKind::Text, true),
    ("attribute_values", "Values (comma separated)", FieldKind::Text, false),
    ("numeric_values", "Numeric values", FieldKind::Boolean, false),
    ("from_range", "Range from", FieldKind::Number, false),
    ("to_range", "Range to", FieldKind::Number, false),
    ("increment", "Increment", FieldKind::Number, false),
];

const ITEM_GROUP_FIELDS: &[(&str, &str, FieldKind, bool)] = &[
    ("item_group_name", "Category name", FieldKind::Text, true),
    ("parent_item_group", "Parent category", FieldKind::Text, false),
    ("description", "Description", FieldKind::Text, false),
    ("seo_title", "SEO title", FieldKind::Text, false),
    ("seo_meta_description", "SEO meta description", FieldKind::Text, false),
    ("seo_keywords", "SEO keywords", FieldKind::Text, false),
];

/// Fixed built-in field list for an entity
pub fn fields_for(entity: SourceEntity) -> Vec<FieldDescriptor> {
    let table = match entity {
        SourceEntity::Item => ITEM_FIELDS,
        SourceEntity::ItemGroup => ITEM_GROUP_FIELDS,
        SourceEntity::ItemVariant => ITEM_VARIANT_FIELDS,
        SourceEntity::ItemAttribute => ITEM_ATTRIBUTE_FIELDS,
    };

    table
        .iter()
        .map(|&(name, label, kind, required)| {
            let field = FieldDescriptor::new(name, label, kind, entity);
            if required { field.required() } else { field }
        })
        .collect()
}
