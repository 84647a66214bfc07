use crate::domain::{PropertyChangeLog, PropertyListing};
use crate::errors::{AppError, Result};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

const LISTING_HEADERS: [&str; 13] = [
    "Address",
    "Price",
    "Status",
    "Beds",
    "Baths",
    "Sqft",
    "Year Built",
    "Price Tier",
    "GIS Tier",
    "Contour (min)",
    "Latitude",
    "Longitude",
    "URL",
];

const CHANGE_HEADERS: [&str; 5] = ["Listing ID", "Timestamp", "Field", "Old", "New"];

fn xlsx_err(what: &str) -> impl Fn(XlsxError) -> AppError + '_ {
    move |e| AppError::Export(format!("Failed to write {what}: {e}"))
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *header)
            .map_err(|e| AppError::Export(format!("Failed to write header '{header}': {e}")))?;
    }
    Ok(())
}

// Missing numbers are left as blank cells.
fn write_opt_number(sheet: &mut Worksheet, row: u32, col: u16, value: Option<f64>, what: &str) -> Result<()> {
    if let Some(v) = value {
        sheet.write_number(row, col, v).map_err(xlsx_err(what))?;
    }
    Ok(())
}

/// Builds a workbook with a "Listings" sheet and a "Changes" sheet (one row
/// per changed field) and returns the file bytes.
pub fn export_listings_xlsx(listings: &[PropertyListing], changes: &[PropertyChangeLog]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Listings").map_err(xlsx_err("sheet name"))?;
    write_headers(sheet, &LISTING_HEADERS)?;

    for (i, listing) in listings.iter().enumerate() {
        let r = (i + 1) as u32;

        sheet
            .write_string(r, 0, &listing.address)
            .map_err(xlsx_err("address"))?;
        write_opt_number(sheet, r, 1, listing.price, "price")?;
        sheet
            .write_string(r, 2, &listing.status)
            .map_err(xlsx_err("status"))?;
        write_opt_number(sheet, r, 3, listing.beds.map(|v| v as f64), "beds")?;
        write_opt_number(sheet, r, 4, listing.baths, "baths")?;
        write_opt_number(sheet, r, 5, listing.sqft.map(|v| v as f64), "sqft")?;
        write_opt_number(sheet, r, 6, listing.year_built.map(|v| v as f64), "year built")?;

        let price_tier = listing.price_tier.map(|t| t.as_str()).unwrap_or("");
        sheet
            .write_string(r, 7, price_tier)
            .map_err(xlsx_err("price tier"))?;

        let gis_tier = listing.gis_tier.map(|t| t.as_str()).unwrap_or("");
        sheet
            .write_string(r, 8, gis_tier)
            .map_err(xlsx_err("gis tier"))?;

        write_opt_number(sheet, r, 9, listing.gis_contour.map(|v| v as f64), "contour")?;
        write_opt_number(sheet, r, 10, listing.latitude, "latitude")?;
        write_opt_number(sheet, r, 11, listing.longitude, "longitude")?;

        let url = listing.property_url.as_deref().unwrap_or("");
        sheet.write_string(r, 12, url).map_err(xlsx_err("url"))?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Changes").map_err(xlsx_err("sheet name"))?;
    write_headers(sheet, &CHANGE_HEADERS)?;

    let mut r = 1u32;
    for entry in changes {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        for (field, change) in &entry.changes {
            sheet
                .write_number(r, 0, entry.property_id as f64)
                .map_err(xlsx_err("listing id"))?;
            sheet
                .write_string(r, 1, &timestamp)
                .map_err(xlsx_err("timestamp"))?;
            sheet.write_string(r, 2, field).map_err(xlsx_err("field"))?;
            sheet
                .write_string(r, 3, change.old.to_string())
                .map_err(xlsx_err("old value"))?;
            sheet
                .write_string(r, 4, change.new.to_string())
                .map_err(xlsx_err("new value"))?;
            r += 1;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| AppError::Export(format!("Failed to save workbook: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::changes::FieldChange;
    use crate::domain::{ChangeSet, Tier};
    use chrono::NaiveDate;
    use serde_json::json;

    fn listing() -> PropertyListing {
        let created_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        PropertyListing {
            id: 1,
            external_id: "https://example.com/a".into(),
            address: "1 Main St, Provo, UT".into(),
            price: Some(240_000.0),
            status: "for_sale".into(),
            listing_type: "for_sale".into(),
            beds: Some(3),
            baths: None,
            sqft: Some(1500),
            year_built: None,
            property_url: Some("https://example.com/a".into()),
            mls: None,
            price_tier: Some(Tier::Silver),
            gis_tier: None,
            gis_contour: None,
            latitude: Some(40.2),
            longitude: Some(-111.6),
            created_at,
            latest_change: None,
        }
    }

    #[test]
    fn workbook_is_a_zip_archive() {
        let mut changes = ChangeSet::new();
        changes.insert(
            "price".into(),
            FieldChange {
                old: json!(250_000.0),
                new: json!(240_000.0),
            },
        );
        let log = PropertyChangeLog {
            id: 1,
            property_id: 1,
            timestamp: listing().created_at,
            changes,
        };

        let bytes = export_listings_xlsx(&[listing()], &[log]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_export_still_produces_a_workbook() {
        let bytes = export_listings_xlsx(&[], &[]).unwrap();
        assert!(!bytes.is_empty());
    }
}
