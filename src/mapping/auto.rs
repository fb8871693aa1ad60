//! Heuristic column-to-field matcher
//!
//! Column names are normalized (lowercase, German umlauts transliterated,
//! other diacritics stripped, punctuation collapsed to single spaces) and
//! looked up in a static alias table. An alias may name several targets (a
//! "Farbe" column is a JTL attribute on items but a variant attribute on
//! variants); the first one present in the catalog wins. Category level columns are recognised
//! by pattern, and columns literally naming a catalog field (or its label)
//! map to it, which is how custom fields get matched.

use super::{FieldMapping, MappingOrigin, ValidatedMapping, validate};
use crate::catalog::FieldCatalog;
use crate::catalog::builtin::CATEGORY_LEVEL_FIELDS;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Alias table: `(alias, target field)`. Aliases are normalized on load; an
/// alias listed more than once keeps its targets in table order.
const ALIASES: &[(&str, &str)] = &[
    // Master data
    ("artikelnummer", "item_code"),
    ("artikel-nr", "item_code"),
    ("art-nr", "item_code"),
    ("sku", "item_code"),
    ("item code", "item_code"),
    ("artikelname", "item_name"),
    ("artikel-name", "item_name"),
    ("name", "item_name"),
    ("bezeichnung", "item_name"),
    ("produktname", "item_name"),
    ("beschreibung", "description"),
    ("kurzbeschreibung", "description"),
    ("langbeschreibung", "description"),
    ("artikelbeschreibung", "description"),
    ("beschreibung (html)", "description_html"),
    ("deaktiviert", "disabled"),
    ("aktiv", "is_active"),
    ("artikel aktiv", "is_active"),
    ("einheit", "stock_uom"),
    ("mengeneinheit", "stock_uom"),
    ("lagereinheit", "stock_uom"),
    // Prices
    ("preis", "standard_rate"),
    ("vk netto", "standard_rate"),
    ("netto vk", "standard_rate"),
    ("verkaufspreis", "standard_rate"),
    ("verkaufspreis netto", "standard_rate"),
    ("vk brutto", "standard_rate_brutto"),
    ("brutto vk", "standard_rate_brutto"),
    ("verkaufspreis brutto", "standard_rate_brutto"),
    ("ek netto", "valuation_rate"),
    ("einkaufspreis", "valuation_rate"),
    ("einkaufspreis netto", "valuation_rate"),
    // Barcodes
    ("ean", "barcode"),
    ("ean/gtin", "barcode"),
    ("gtin", "barcode"),
    ("barcode", "barcode"),
    ("upc", "barcode"),
    ("isbn", "barcode"),
    // Manufacturer
    ("han", "manufacturer_part_no"),
    ("herstellerartikelnummer", "manufacturer_part_no"),
    ("hersteller-artikelnummer", "manufacturer_part_no"),
    ("hersteller", "brand"),
    ("marke", "brand"),
    ("brand", "brand"),
    ("manufacturer", "brand"),
    // Weight and dimensions
    ("gewicht", "weight_per_unit"),
    ("artikelgewicht", "weight_per_unit"),
    ("versandgewicht", "weight_per_unit"),
    ("gewicht (kg)", "weight_per_unit"),
    ("länge", "item_length"),
    ("länge (cm)", "item_length"),
    ("breite", "item_width"),
    ("breite (cm)", "item_width"),
    ("höhe", "item_height"),
    ("höhe (cm)", "item_height"),
    // Categories
    ("warengruppe", "item_group"),
    ("kategorie", "item_group"),
    ("artikelgruppe", "item_group"),
    ("hauptkategorie", "category_level_1"),
    ("unterkategorie", "category_level_2"),
    ("kategoriepfad", "category_path"),
    ("kategorie pfad", "category_path"),
    ("category path", "category_path"),
    // Customs and origin
    ("herkunftsland", "country_of_origin"),
    ("ursprungsland", "country_of_origin"),
    ("taric", "customs_tariff_number"),
    ("taric-code", "customs_tariff_number"),
    ("zolltarifnummer", "customs_tariff_number"),
    ("zolltarif", "customs_tariff_number"),
    // SEO
    ("seo titel", "seo_title"),
    ("seo title", "seo_title"),
    ("titel-tag (seo)", "seo_title"),
    ("meta title", "seo_title"),
    ("seo beschreibung", "seo_meta_description"),
    ("seo description", "seo_meta_description"),
    ("meta description", "seo_meta_description"),
    ("meta-description (seo)", "seo_meta_description"),
    ("seo keywords", "seo_keywords"),
    ("meta keywords", "seo_keywords"),
    ("meta-keywords (seo)", "seo_keywords"),
    ("suchbegriffe", "seo_keywords"),
    ("url pfad", "seo_url_slug"),
    ("url slug", "seo_url_slug"),
    ("seo url", "seo_url_slug"),
    // Delivery
    ("lieferstatus", "delivery_time"),
    ("lieferzeit", "delivery_time"),
    ("lieferzeit text", "delivery_time"),
    // JTL attributes
    ("farbe", "jattr_farbe"),
    ("material", "jattr_material"),
    ("größe", "jattr_groesse"),
    ("regalsystem", "jattr_regalsystem"),
    ("fachlast", "jattr_fachlast"),
    ("feldlast", "jattr_feldlast"),
    ("gesamtbreite", "jattr_gesamtbreite_mm"),
    ("gesamtbreite (mm)", "jattr_gesamtbreite_mm"),
    ("gesamthöhe", "jattr_gesamthoehe_mm"),
    ("gesamthöhe (mm)", "jattr_gesamthoehe_mm"),
    ("bauweise", "jattr_bauweise"),
    ("bodentyp", "jattr_bodentyp"),
    ("anzahl böden", "jattr_anzahl_boeden"),
    // Variants
    ("ist vaterartikel", "has_variants"),
    ("vaterartikel", "has_variants"),
    ("identifizierungsspalte vaterartikel", "variant_of"),
    ("variante von", "variant_of"),
    ("vorlage", "variant_of"),
    ("vorlagenartikel", "variant_of"),
    ("template", "variant_of"),
    ("variantennummer", "item_code"),
    ("variantenname", "item_name"),
    ("farbe", "attribute_color"),
    ("größe", "attribute_size"),
    ("material", "attribute_material"),
    ("attribut 1", "attribute_1"),
    ("attribut 2", "attribute_2"),
    ("attribut 3", "attribute_3"),
    // Attribute imports
    ("attributname", "attribute_name"),
    ("attribut", "attribute_name"),
    ("attribute name", "attribute_name"),
    ("werte", "attribute_values"),
    ("attributwerte", "attribute_values"),
    ("numerisch", "numeric_values"),
    ("von", "from_range"),
    ("bis", "to_range"),
    ("schrittweite", "increment"),
    ("inkrement", "increment"),
    // Item group imports
    ("kategoriename", "item_group_name"),
    ("oberkategorie", "parent_item_group"),
];

static ALIAS_TABLE: Lazy<HashMap<String, Vec<&'static str>>> = Lazy::new(|| {
    let mut table: HashMap<String, Vec<&'static str>> = HashMap::new();
    for &(alias, target) in ALIASES {
        let targets = table.entry(normalize(alias)).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    table
});

static CATEGORY_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:category|kategorie)(?: level| ebene)? ([1-4])$").expect("valid regex")
});

/// Normalize a column name or alias for lookup
pub fn normalize(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        match c {
            'ä' => folded.push_str("ae"),
            'ö' => folded.push_str("oe"),
            'ü' => folded.push_str("ue"),
            'ß' => folded.push_str("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' => folded.push('a'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' => folded.push('o'),
            'ù' | 'ú' | 'û' => folded.push('u'),
            'ç' => folded.push('c'),
            'ñ' => folded.push('n'),
            c if c.is_ascii_alphanumeric() => folded.push(c),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic mapper backed by the static alias table
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoMapper;

impl AutoMapper {
    pub fn new() -> Self {
        Self
    }

    /// Target field for a single column, ignoring what other columns took
    pub fn match_column(&self, column: &str, catalog: &FieldCatalog) -> Option<String> {
        let key = normalize(column);
        if key.is_empty() {
            return None;
        }

        if let Some(targets) = ALIAS_TABLE.get(&key) {
            if let Some(target) = targets.iter().find(|t| catalog.contains(t)) {
                return Some(target.to_string());
            }
        }

        if let Some(caps) = CATEGORY_LEVEL.captures(&key) {
            let level: usize = caps[1].parse().ok()?;
            let slot = CATEGORY_LEVEL_FIELDS[level - 1];
            if catalog.contains(slot) {
                return Some(slot.to_string());
            }
        }

        // Direct hits on a field name or label; lowest field name wins so the
        // result does not depend on catalog order
        catalog
            .fields()
            .iter()
            .filter(|f| normalize(&f.name) == key || normalize(&f.label) == key)
            .map(|f| f.name.clone())
            .min()
    }

    /// Propose a mapping for `source_columns` and pass it through the gate.
    ///
    /// Columns are visited in source order; a target already taken by an
    /// earlier column is not proposed again.
    pub fn suggest(&self, source_columns: &[String], catalog: &FieldCatalog) -> ValidatedMapping {
        let mut used = HashSet::new();
        let mut proposal = FieldMapping::new();

        for column in source_columns {
            match self.match_column(column, catalog) {
                Some(target) if used.insert(target.clone()) => {
                    debug!("Auto-mapped '{}' -> {}", column, target);
                    proposal.insert(column.clone(), target);
                }
                Some(target) => debug!("'{}' matches {} which is already mapped", column, target),
                None => debug!("No match for column '{}'", column),
            }
        }

        validate(
            proposal
                .iter()
                .map(|e| (e.source_column.as_str(), e.target_field.as_str())),
            MappingOrigin::Heuristic,
            source_columns,
            catalog,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDescriptor, FieldKind, SourceEntity, builtin};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Artikel-Nr."), "artikel nr");
        assert_eq!(normalize("  Länge (cm) "), "laenge cm");
        assert_eq!(normalize("VK_Brutto"), "vk brutto");
        assert_eq!(normalize("Größe"), "groesse");
        assert_eq!(normalize("Café"), "cafe");
        assert_eq!(normalize("---"), "");
    }

    #[test]
    fn test_aliases_match_regardless_of_spelling() {
        let catalog = FieldCatalog::builtin(SourceEntity::Item);
        let mapper = AutoMapper::new();

        assert_eq!(mapper.match_column("Artikelnummer", &catalog).as_deref(), Some("item_code"));
        assert_eq!(mapper.match_column("ARTIKEL-NR", &catalog).as_deref(), Some("item_code"));
        assert_eq!(mapper.match_column("sku", &catalog).as_deref(), Some("item_code"));
        assert_eq!(mapper.match_column("Laenge", &catalog).as_deref(), Some("item_length"));
        assert_eq!(mapper.match_column("VK-Brutto", &catalog).as_deref(), Some("standard_rate_brutto"));
        assert_eq!(mapper.match_column("Lagerplatz", &catalog), None);
    }

    #[test]
    fn test_active_column_maps_to_active_flag() {
        let catalog = FieldCatalog::builtin(SourceEntity::Item);
        let mapper = AutoMapper::new();

        assert_eq!(mapper.match_column("Aktiv", &catalog).as_deref(), Some("is_active"));
        assert_eq!(mapper.match_column("Artikel aktiv", &catalog).as_deref(), Some("is_active"));
        assert_eq!(mapper.match_column("Deaktiviert", &catalog).as_deref(), Some("disabled"));
    }

    #[test]
    fn test_alias_target_depends_on_entity() {
        let mapper = AutoMapper::new();
        let items = FieldCatalog::builtin(SourceEntity::Item);
        let variants = FieldCatalog::builtin(SourceEntity::ItemVariant);
        let attributes = FieldCatalog::builtin(SourceEntity::ItemAttribute);

        assert_eq!(mapper.match_column("Farbe", &items).as_deref(), Some("jattr_farbe"));
        assert_eq!(mapper.match_column("Farbe", &variants).as_deref(), Some("attribute_color"));
        assert_eq!(mapper.match_column("Größe", &variants).as_deref(), Some("attribute_size"));
        assert_eq!(mapper.match_column("Vorlage", &variants).as_deref(), Some("variant_of"));
        assert_eq!(mapper.match_column("Attribut 2", &variants).as_deref(), Some("attribute_2"));
        assert_eq!(mapper.match_column("Attributname", &attributes).as_deref(), Some("attribute_name"));
        assert_eq!(mapper.match_column("Werte", &attributes).as_deref(), Some("attribute_values"));
        assert_eq!(mapper.match_column("Farbe", &attributes), None);
    }

    #[test]
    fn test_category_level_pattern() {
        let catalog = FieldCatalog::builtin(SourceEntity::Item);
        let mapper = AutoMapper::new();

        assert_eq!(mapper.match_column("Category Level 2", &catalog).as_deref(), Some("category_level_2"));
        assert_eq!(mapper.match_column("Kategorie (Ebene 4)", &catalog).as_deref(), Some("category_level_4"));
        assert_eq!(mapper.match_column("kategorie_ebene_1", &catalog).as_deref(), Some("category_level_1"));
        assert_eq!(mapper.match_column("Category Level 5", &catalog), None);
    }

    #[test]
    fn test_custom_field_matched_by_name() {
        let catalog = FieldCatalog::load(
            builtin::fields_for(SourceEntity::Item),
            vec![FieldDescriptor::new("custom_load_class", "Load class", FieldKind::Text, SourceEntity::Item)],
        );
        let mapper = AutoMapper::new();
        assert_eq!(mapper.match_column("Load Class", &catalog).as_deref(), Some("custom_load_class"));
        assert_eq!(mapper.match_column("custom_load_class", &catalog).as_deref(), Some("custom_load_class"));
    }

    #[test]
    fn test_suggest_first_column_keeps_target() {
        let catalog = FieldCatalog::builtin(SourceEntity::Item);
        let validated = AutoMapper::new().suggest(
            &cols(&["SKU", "Artikelnummer", "Bezeichnung", "Unbekannt"]),
            &catalog,
        );
        let mapping = validated.mapping();

        assert_eq!(mapping.source_for("item_code"), Some("SKU"));
        assert_eq!(mapping.target_for("Artikelnummer"), None);
        assert_eq!(mapping.target_for("Bezeichnung"), Some("item_name"));
        assert_eq!(mapping.target_for("Unbekannt"), None);
        assert!(validated.missing_required().is_empty());
    }

    #[test]
    fn test_suggest_independent_of_catalog_order() {
        let mut reversed = builtin::fields_for(SourceEntity::Item);
        reversed.reverse();
        let a = FieldCatalog::builtin(SourceEntity::Item);
        let b = FieldCatalog::load(reversed, Vec::new());
        let columns = cols(&["EAN", "Hersteller", "Kategorie Ebene 1", "Gewicht", "item_group"]);

        let mapper = AutoMapper::new();
        assert_eq!(mapper.suggest(&columns, &a).mapping(), mapper.suggest(&columns, &b).mapping());
    }
}
