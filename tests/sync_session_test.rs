//! Integration tests for the blocking session facade.
//!
//! These tests require a running PostgreSQL database. Set the
//! `TEST_POSTGRES_URL` environment variable to run them.

mod common;

use active_pg::{ActiveRecordSync, EntityState, ExecutionMode, PrimaryKeyedSync, col};
use common::{City, Country, test_registry, unique_prefix};

#[test]
fn test_blocking_lifecycle_matches_async_behavior() {
    let Some(registry) = test_registry(ExecutionMode::Sync) else {
        eprintln!("Skipping test: TEST_POSTGRES_URL not set");
        return;
    };
    let mut session = registry.sync_session(None).unwrap();
    session
        .execute_sql(
            "CREATE TABLE IF NOT EXISTS country (
                id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                name text NOT NULL,
                code text NOT NULL UNIQUE,
                created_at timestamptz NOT NULL DEFAULT now(),
                updated_at timestamptz NOT NULL DEFAULT now()
            )",
            &[],
        )
        .unwrap();
    session
        .execute_sql(
            "CREATE TABLE IF NOT EXISTS city (
                id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                name text NOT NULL,
                code text NOT NULL UNIQUE,
                country_id uuid REFERENCES country (id) ON DELETE CASCADE,
                created_at timestamptz NOT NULL DEFAULT now(),
                updated_at timestamptz NOT NULL DEFAULT now()
            )",
            &[],
        )
        .unwrap();
    session.commit().unwrap();
    let prefix = unique_prefix("sync");

    let mut country = Country::new("Blockington", &format!("{prefix}-B"));
    <Country as ActiveRecordSync>::add(&mut session, &mut country, false).unwrap();
    let country_id = country.id.unwrap();
    assert!(country.created_at.is_some());

    // Blocking sessions expire tracked entities on commit.
    session.commit().unwrap();
    assert_eq!(
        session.entity_state(&country).unwrap(),
        Some(EntityState::Expired)
    );
    session.refresh(&mut country).unwrap();
    assert_eq!(
        session.entity_state(&country).unwrap(),
        Some(EntityState::Persistent)
    );

    let cities = vec![
        City::new("Stopgap", &format!("{prefix}-SG"), country_id),
        City::new("Haltville", &format!("{prefix}-HV"), country_id),
    ];
    let inserted = <City as ActiveRecordSync>::add_all(&mut session, &cities, true, false, None).unwrap();
    assert_eq!(inserted.len(), 2);

    let mine = <City as ActiveRecordSync>::filter_by(vec![col("country_id").eq(country_id)]);
    let count = <City as ActiveRecordSync>::count(&mut session, Some(mine.clone())).unwrap();
    assert_eq!(count, 2);

    let found = <Country as PrimaryKeyedSync>::find(&mut session, country_id)
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Blockington");

    country.name = "Blockington-on-Hold".to_string();
    country.save(&mut session, true).unwrap();
    let reread = <Country as PrimaryKeyedSync>::find(&mut session, country_id)
        .unwrap()
        .unwrap();
    assert_eq!(reread.name, "Blockington-on-Hold");

    <Country as ActiveRecordSync>::delete(&mut session, &country).unwrap();
    let gone = <Country as PrimaryKeyedSync>::find(&mut session, country_id).unwrap();
    assert!(gone.is_none());
    let remaining = <City as ActiveRecordSync>::count(&mut session, Some(mine)).unwrap();
    assert_eq!(remaining, 0);
    session.commit().unwrap();
}

#[test]
fn test_sync_session_refused_by_async_registry() {
    let Some(registry) = test_registry(ExecutionMode::Async) else {
        eprintln!("Skipping test: TEST_POSTGRES_URL not set");
        return;
    };
    let err = registry.sync_session(None).unwrap_err();
    assert!(err.to_string().contains("sync-mode"));
}
