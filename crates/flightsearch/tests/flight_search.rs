//! End-to-end behavior over an on-disk database seeded with the bundled catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flightsearch::{
    DuplicatePolicy, FlightQueryService, FlightsRepository, Mode, SchemaStatus, SeedSource,
    SqliteRepository, Storage, ToggleEvent, ViewStateCoordinator, NOT_FAVORITE_ID,
};

fn scratch() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("flights.db");
    (dir, db)
}

fn open(path: &Path, policy: DuplicatePolicy) -> Arc<SqliteRepository> {
    let mut storage = Storage::open(path).unwrap();
    storage.seed_if_empty(&SeedSource::Bundled).unwrap();
    Arc::new(SqliteRepository::new(storage, policy))
}

fn coordinator(repo: &Arc<SqliteRepository>) -> ViewStateCoordinator {
    ViewStateCoordinator::new(FlightQueryService::new(
        Arc::clone(repo) as Arc<dyn FlightsRepository>
    ))
}

#[tokio::test]
async fn test_search_select_toggle_and_back_to_favorites() {
    let (_dir, db) = scratch();
    let repo = open(&db, DuplicatePolicy::Reuse);
    let mut view = coordinator(&repo);

    view.update_search_text("FC");
    view.suggestions_stream().settled().await.unwrap();
    let fco = view
        .suggestions()
        .into_iter()
        .find(|a| a.iata_code == "FCO")
        .unwrap();

    view.select_origin(&fco);
    assert_eq!(view.mode(), Mode::OriginResults);
    view.flights_from_origin_stream().settled().await.unwrap();
    let flights = view.flights_from_origin();
    let total = repo.all_airports().await.unwrap().len();
    assert_eq!(flights.len(), total - 1);
    assert!(flights.iter().all(|f| f.to.iata_code != "FCO"));
    assert!(flights.iter().all(|f| !f.is_favorite && f.id == NOT_FAVORITE_ID));

    let to_jfk = flights
        .iter()
        .find(|f| f.to.iata_code == "JFK")
        .cloned()
        .unwrap();
    view.toggle_favorite(&to_jfk);
    let Some(ToggleEvent::Confirmed { id, is_favorite, .. }) = view.next_completion().await else {
        panic!("toggle was not confirmed");
    };
    assert!(is_favorite);
    assert_eq!(repo.favorite_id("FCO", "JFK").await.unwrap(), Some(id));

    let state = view
        .favorites_stream()
        .wait_for(|s| !s.items().is_empty())
        .await
        .unwrap();
    let favorite = &state.items()[0];
    assert!(favorite.is_favorite);
    assert_eq!(favorite.id, id);
    assert_eq!(favorite.key().to_string(), "FCO -> JFK");

    view.update_search_text("");
    assert_eq!(view.mode(), Mode::Favorites);
    assert!(view.flights_from_origin().is_empty());
    assert_eq!(view.favorite_flights().len(), 1);
}

#[tokio::test]
async fn test_favorites_survive_reopen() {
    let (_dir, db) = scratch();
    {
        let repo = open(&db, DuplicatePolicy::Reuse);
        repo.add_favorite("MUC", "BGY").await.unwrap();
    }

    let repo = open(&db, DuplicatePolicy::Reuse);
    let favorites = repo.all_favorites().await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].departure_code, "MUC");
}

#[tokio::test]
async fn test_schema_mismatch_resets_favorites_and_reseeds() {
    let (_dir, db) = scratch();
    let airports = {
        let repo = open(&db, DuplicatePolicy::Reuse);
        repo.add_favorite("FCO", "JFK").await.unwrap();
        repo.all_airports().await.unwrap().len()
    };

    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute(
            "UPDATE metadata SET value = '99' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
    }

    let mut storage = Storage::open(&db).unwrap();
    assert_eq!(
        storage.schema_status(),
        SchemaStatus::Recreated { from_version: 99 }
    );
    assert_eq!(storage.seed_if_empty(&SeedSource::Bundled).unwrap(), airports);

    let repo = SqliteRepository::new(storage, DuplicatePolicy::Reuse);
    assert!(repo.all_favorites().await.unwrap().is_empty());
    assert_eq!(repo.all_airports().await.unwrap().len(), airports);
}

#[tokio::test]
async fn test_duplicate_policy() {
    let (_dir, db) = scratch();
    let reuse = open(&db, DuplicatePolicy::Reuse);
    let first = reuse.add_favorite("OPO", "ARN").await.unwrap();
    assert_eq!(reuse.add_favorite("OPO", "ARN").await.unwrap(), first);
    drop(reuse);

    let reject = open(&db, DuplicatePolicy::Reject);
    let err = reject.add_favorite("OPO", "ARN").await.unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(reject.all_favorites().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_favorite_endpoint_is_reported() {
    let (_dir, db) = scratch();
    let repo = open(&db, DuplicatePolicy::Reuse);
    repo.add_favorite("ZZZ", "JFK").await.unwrap();
    repo.add_favorite("WAW", "LIS").await.unwrap();

    let view = coordinator(&repo);
    view.favorites_stream().settled().await.unwrap();

    let favorites = view.favorite_flights();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].key().to_string(), "WAW -> LIS");

    let issues = view.favorite_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].missing_code, "ZZZ");
}
