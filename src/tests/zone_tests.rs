use crate::db::change_log::all_change_logs;
use crate::db::listings::list_listings;
use crate::db::zones::{count_zones, list_zones, replace_zones, zones_feature_collection};
use crate::domain::Tier;
use crate::errors::AppError;
use crate::gis::features::{feature, feature_collection};
use crate::gis::geometry::square;
use crate::gis::{match_zone, LatLon, NewZone, TierThresholds, ZoneMatch};
use crate::services::ingest::ingest_batch;
use crate::services::{backfill, regenerate_zones, seed_zones};
use crate::tests::utils::{init_test_db, nested_collection, raw_listing, FakeProvider};
use serde_json::json;

const CENTER: LatLon = LatLon { lat: 0.5, lon: 0.5 };

fn tiers_by_contour(db: &crate::db::connection::Database) -> Vec<(i64, Tier)> {
    db.with_conn(|conn| list_zones(conn))
        .unwrap()
        .into_iter()
        .map(|z| (z.contour, z.tier))
        .collect()
}

#[test]
fn regeneration_tiers_by_duration_rank() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    let provider = FakeProvider::returning(nested_collection([15.0, 30.0, 45.0]));

    let outcome = regenerate_zones(&t.db, &provider, CENTER, &[45, 15, 30], "auto")?;

    assert_eq!(outcome.inserted, 3);
    assert_eq!(*provider.requested.borrow(), vec![15, 30, 45]);
    assert_eq!(
        tiers_by_contour(&t.db),
        vec![(15, Tier::Gold), (30, Tier::Silver), (45, Tier::Bronze)]
    );
    Ok(())
}

#[test]
fn only_three_shortest_durations_are_requested() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    let provider = FakeProvider::returning(nested_collection([10.0, 20.0, 30.0]));

    regenerate_zones(&t.db, &provider, CENTER, &[60, 30, 10, 20], "auto")?;

    assert_eq!(*provider.requested.borrow(), vec![10, 20, 30]);
    assert_eq!(t.db.with_conn(|conn| count_zones(conn))?, 3);
    Ok(())
}

#[test]
fn features_for_unrequested_durations_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    // Provider answers 15/30 as asked plus a stray 50.
    let provider = FakeProvider::returning(nested_collection([15.0, 30.0, 50.0]));

    let outcome = regenerate_zones(&t.db, &provider, CENTER, &[15, 30, 45], "auto")?;

    assert_eq!(outcome.inserted, 2);
    assert_eq!(tiers_by_contour(&t.db), vec![(15, Tier::Gold), (30, Tier::Silver)]);
    Ok(())
}

#[test]
fn provider_failure_leaves_zones_intact() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    seed_zones(&t.db, &nested_collection([15.0, 30.0, 45.0]), &TierThresholds::default())?;
    let before = tiers_by_contour(&t.db);

    let result = regenerate_zones(&t.db, &FakeProvider::failing(), CENTER, &[15, 30, 45], "auto");

    assert!(matches!(result, Err(AppError::ZoneGeneration(_))));
    assert_eq!(tiers_by_contour(&t.db), before);
    Ok(())
}

#[test]
fn empty_provider_result_leaves_zones_intact() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    seed_zones(&t.db, &nested_collection([15.0, 30.0, 45.0]), &TierThresholds::default())?;

    let provider = FakeProvider::returning(feature_collection(Vec::new()));
    let result = regenerate_zones(&t.db, &provider, CENTER, &[15, 30, 45], "auto");

    assert!(matches!(result, Err(AppError::EmptyZoneSet)));
    assert_eq!(t.db.with_conn(|conn| count_zones(conn))?, 3);
    Ok(())
}

#[test]
fn no_positive_durations_is_invalid_input() {
    let t = init_test_db();
    let provider = FakeProvider::returning(nested_collection([15.0, 30.0, 45.0]));

    let result = regenerate_zones(&t.db, &provider, CENTER, &[0], "auto");

    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(provider.requested.borrow().is_empty());
}

#[test]
fn regeneration_replaces_the_whole_set() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    seed_zones(&t.db, &nested_collection([15.0, 30.0, 45.0]), &TierThresholds::default())?;

    let provider = FakeProvider::returning(feature_collection(vec![feature(
        square(0.0, 0.0, 1.0),
        json!({ "contour": 20 }),
    )]));
    regenerate_zones(&t.db, &provider, CENTER, &[20], "pedestrian")?;

    assert_eq!(tiers_by_contour(&t.db), vec![(20, Tier::Gold)]);
    Ok(())
}

#[test]
fn seeding_discards_contours_beyond_bronze() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    let doc = feature_collection(vec![
        feature(square(0.0, 0.0, 1.0), json!({ "contour": 80 })),
        feature(square(0.2, 0.2, 0.5), json!({ "contour": 40 })),
    ]);

    let outcome = seed_zones(&t.db, &doc, &TierThresholds::default())?;

    assert_eq!(outcome.inserted, 1);
    assert_eq!(tiers_by_contour(&t.db), vec![(40, Tier::Gold)]);
    Ok(())
}

#[test]
fn seeding_accepts_a_wrapped_collection() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    let doc = json!([nested_collection([40.0, 60.0, 75.0])]);

    seed_zones(&t.db, &doc, &TierThresholds::default())?;

    assert_eq!(
        tiers_by_contour(&t.db),
        vec![(40, Tier::Gold), (60, Tier::Silver), (75, Tier::Bronze)]
    );
    Ok(())
}

#[test]
fn match_prefers_smallest_enclosing_contour() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    let provider = FakeProvider::returning(nested_collection([15.0, 30.0, 45.0]));
    regenerate_zones(&t.db, &provider, CENTER, &[15, 30, 45], "auto")?;

    assert_eq!(
        match_zone(&t.db, 0.5, 0.5),
        Some(ZoneMatch { tier: Tier::Gold, contour: 15 })
    );
    assert_eq!(
        match_zone(&t.db, 0.3, 0.3),
        Some(ZoneMatch { tier: Tier::Silver, contour: 30 })
    );
    assert_eq!(
        match_zone(&t.db, 0.1, 0.1),
        Some(ZoneMatch { tier: Tier::Bronze, contour: 45 })
    );
    assert_eq!(match_zone(&t.db, 10.0, 10.0), None);
    Ok(())
}

#[test]
fn match_with_no_zones_is_unzoned() {
    let t = init_test_db();
    assert_eq!(match_zone(&t.db, 0.5, 0.5), None);
}

#[test]
fn regeneration_backfills_listings_without_logging() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    ingest_batch(
        &t.db,
        &[
            raw_listing("https://example.com/in", 240_000.0, 0.5, 0.5),
            raw_listing("https://example.com/out", 240_000.0, 9.0, 9.0),
        ],
        "for_sale",
    )?;

    let provider = FakeProvider::returning(nested_collection([15.0, 30.0, 45.0]));
    let outcome = regenerate_zones(&t.db, &provider, CENTER, &[15, 30, 45], "auto")?;
    assert_eq!(outcome.backfilled, 1);

    let (listings, logs) = t.db.with_conn(|conn| Ok((list_listings(conn)?, all_change_logs(conn)?)))?;
    let inside = listings
        .iter()
        .find(|l| l.external_id == "https://example.com/in")
        .ok_or("missing listing")?;
    assert_eq!(inside.gis_tier, Some(Tier::Gold));
    assert_eq!(inside.gis_contour, Some(15));
    assert!(logs.is_empty());
    Ok(())
}

#[test]
fn backfill_twice_updates_nothing_the_second_time() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    // Ingested before any zone exists, so the stored zone fields are empty.
    ingest_batch(&t.db, &[raw_listing("https://example.com/in", 240_000.0, 0.3, 0.3)], "for_sale")?;

    // Swapped in directly so nothing backfills on our behalf.
    let zone = NewZone {
        tier: Tier::Silver,
        contour: 30,
        geometry: square(0.2, 0.2, 0.6),
    };
    t.db.with_conn(|conn| replace_zones(conn, &[zone]))?;

    assert_eq!(backfill(&t.db)?, 1);
    assert_eq!(backfill(&t.db)?, 0);

    let listings = t.db.with_conn(|conn| list_listings(conn))?;
    assert_eq!(listings[0].gis_tier, Some(Tier::Silver));
    assert_eq!(listings[0].gis_contour, Some(30));
    Ok(())
}

#[test]
fn backfill_clears_zone_fields_when_zones_shrink() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    seed_zones(&t.db, &nested_collection([15.0, 30.0, 45.0]), &TierThresholds::default())?;
    ingest_batch(&t.db, &[raw_listing("https://example.com/edge", 240_000.0, 0.1, 0.1)], "for_sale")?;

    // Only the innermost square survives, which no longer covers the listing.
    let provider = FakeProvider::returning(feature_collection(vec![feature(
        square(0.4, 0.4, 0.2),
        json!({ "contour": 15 }),
    )]));
    let outcome = regenerate_zones(&t.db, &provider, CENTER, &[15], "auto")?;
    assert_eq!(outcome.backfilled, 1);

    let listings = t.db.with_conn(|conn| list_listings(conn))?;
    assert_eq!(listings[0].gis_tier, None);
    assert_eq!(listings[0].gis_contour, None);
    Ok(())
}

#[test]
fn zone_set_exports_as_feature_collection() -> Result<(), Box<dyn std::error::Error>> {
    let t = init_test_db();
    seed_zones(&t.db, &nested_collection([15.0, 30.0, 45.0]), &TierThresholds::default())?;

    let fc = t.db.with_conn(|conn| zones_feature_collection(conn))?;

    assert_eq!(fc["type"], "FeatureCollection");
    let features = fc["features"].as_array().ok_or("features not an array")?;
    assert_eq!(features.len(), 3);
    assert_eq!(features[0]["properties"]["contour"], 15);
    assert_eq!(features[0]["properties"]["tier"], "gold");
    Ok(())
}
