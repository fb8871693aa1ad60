//! BMEcat XML reader
//!
//! Supports the `ARTICLE` layout of BMEcat 1.2 and the `PRODUCT` layout of
//! BMEcat 2005. Namespaces are ignored; elements are matched on local names.

use super::{SourceRow, SourceTable};
use anyhow::{Context, Result};
use log::{debug, warn};
use roxmltree::{Document, Node};
use std::path::Path;

/// Column names produced for every article, in output order
pub const COLUMNS: [&str; 7] = [
    "artikelnummer",
    "artikelname",
    "beschreibung",
    "ean",
    "han",
    "hersteller",
    "preis",
];

pub fn read_file(path: &Path) -> Result<SourceTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read XML file: {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse BMEcat file {}", path.display()))
}

pub fn parse(xml: &str) -> Result<SourceTable> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let doc = Document::parse(xml).map_err(|e| anyhow::anyhow!("Invalid XML: {}", e))?;

    let mut rows = Vec::new();
    for article in doc
        .descendants()
        .filter(|n| is_named(n, "ARTICLE") || is_named(n, "PRODUCT"))
    {
        match parse_article(article, rows.len() + 1) {
            Some(row) => rows.push(row),
            None => warn!("Skipping BMEcat article without supplier id"),
        }
    }

    debug!("BMEcat parsed: {} articles", rows.len());
    Ok(SourceTable {
        columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    })
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, names: &[&str]) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| names.iter().any(|name| is_named(c, name)))
}

/// Text of the first descendant matching any of `names`
fn text(node: Option<Node>, names: &[&str]) -> String {
    node.and_then(|n| {
        n.descendants()
            .find(|d| names.iter().any(|name| is_named(d, name)))
            .and_then(|d| d.text())
    })
    .map(|t| t.trim().to_string())
    .unwrap_or_default()
}

fn parse_article(article: Node, line: usize) -> Option<SourceRow> {
    let supplier_id = text(
        child(article, &["SUPPLIER_AID", "SUPPLIER_PID"]),
        &["SUPPLIER_AID", "SUPPLIER_PID"],
    );
    if supplier_id.is_empty() {
        return None;
    }

    let details = child(article, &["ARTICLE_DETAILS", "PRODUCT_DETAILS"]);
    let prices = child(article, &["ARTICLE_PRICE_DETAILS", "PRODUCT_PRICE_DETAILS"]);

    let mut row = SourceRow::new(line);
    row.insert("artikelnummer", supplier_id);
    row.insert("artikelname", text(details, &["DESCRIPTION_SHORT"]));
    row.insert("beschreibung", text(details, &["DESCRIPTION_LONG"]));
    row.insert("ean", text(details, &["EAN", "INTERNATIONAL_PID"]));
    row.insert("han", text(details, &["MANUFACTURER_AID", "MANUFACTURER_PID"]));
    row.insert("hersteller", text(details, &["MANUFACTURER_NAME"]));
    row.insert("preis", text(prices, &["PRICE_AMOUNT"]));
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BMECAT_12: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<BMECAT version="1.2" xmlns="http://www.bmecat.org/bmecat/1.2/bmecat_new_catalog">
  <T_NEW_CATALOG>
    <ARTICLE>
      <SUPPLIER_AID>ART123</SUPPLIER_AID>
      <ARTICLE_DETAILS>
        <DESCRIPTION_SHORT>Steckregal</DESCRIPTION_SHORT>
        <DESCRIPTION_LONG>Verzinkt, 5 Böden</DESCRIPTION_LONG>
        <EAN>4006381333931</EAN>
        <MANUFACTURER_AID>H-77</MANUFACTURER_AID>
        <MANUFACTURER_NAME>Acme</MANUFACTURER_NAME>
      </ARTICLE_DETAILS>
      <ARTICLE_PRICE_DETAILS>
        <ARTICLE_PRICE price_type="net_list"><PRICE_AMOUNT>49.90</PRICE_AMOUNT></ARTICLE_PRICE>
        <ARTICLE_PRICE price_type="gros_list"><PRICE_AMOUNT>59.38</PRICE_AMOUNT></ARTICLE_PRICE>
      </ARTICLE_PRICE_DETAILS>
    </ARTICLE>
    <ARTICLE>
      <ARTICLE_DETAILS><DESCRIPTION_SHORT>No id</DESCRIPTION_SHORT></ARTICLE_DETAILS>
    </ARTICLE>
  </T_NEW_CATALOG>
</BMECAT>"#;

    #[test]
    fn test_parse_bmecat_12() {
        let table = parse(BMECAT_12).unwrap();
        assert_eq!(table.columns.len(), COLUMNS.len());
        assert_eq!(table.rows.len(), 1);

        let row = &table.rows[0];
        assert_eq!(row.get("artikelnummer"), Some("ART123"));
        assert_eq!(row.get("artikelname"), Some("Steckregal"));
        assert_eq!(row.get("ean"), Some("4006381333931"));
        assert_eq!(row.get("hersteller"), Some("Acme"));
        assert_eq!(row.get("preis"), Some("49.90"));
    }

    #[test]
    fn test_parse_bmecat_2005_product() {
        let xml = r#"<BMECAT><T_NEW_CATALOG><PRODUCT>
            <SUPPLIER_PID>P-9</SUPPLIER_PID>
            <PRODUCT_DETAILS><DESCRIPTION_SHORT>Box</DESCRIPTION_SHORT></PRODUCT_DETAILS>
        </PRODUCT></T_NEW_CATALOG></BMECAT>"#;
        let table = parse(xml).unwrap();
        assert_eq!(table.rows[0].get("artikelnummer"), Some("P-9"));
        assert_eq!(table.rows[0].get("preis"), Some(""));
    }

    #[test]
    fn test_invalid_xml() {
        assert!(parse("<BMECAT><ARTICLE>").is_err());
    }
}
