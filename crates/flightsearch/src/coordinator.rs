//! View state for a flight search screen.
//!
//! [`ViewStateCoordinator`] owns the search text, the selected origin and
//! the live result lists, and turns user actions into queries and toggles.
//!
//! Favorite toggles are two-phase. The flip is recorded as a speculative
//! overlay on top of the live lists the moment the user taps; the write runs
//! in its own task and reports back through a channel. A confirmed overlay
//! stays until a list snapshot taken after the write arrives, at which point
//! the live data takes over. A failed write drops the overlay, which reverts
//! the flip.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, ResolutionError, Result};
use crate::live::{Live, LiveState};
use crate::model::{Airport, Flight, FlightKey, NOT_FAVORITE_ID};
use crate::query::FlightQueryService;
use crate::toggle::{FavoriteToggle, ToggleIntent, ToggleOutcome};

/// Which list the screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The saved favorites.
    #[default]
    Favorites,
    /// Flights from the selected origin.
    OriginResults,
}

/// Handle for a toggle that has been shown but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleTicket {
    /// The toggled pair.
    pub key: FlightKey,
    /// Increases with every toggle issued by one coordinator.
    pub generation: u64,
}

/// A finished toggle.
#[derive(Debug, Clone)]
pub enum ToggleEvent {
    /// The write landed.
    Confirmed {
        /// The toggled pair.
        key: FlightKey,
        /// Generation of the toggle.
        generation: u64,
        /// Favorite state now stored.
        is_favorite: bool,
        /// Favorite id now stored, or [`NOT_FAVORITE_ID`].
        id: i64,
    },
    /// The write failed; the optimistic flip has been reverted.
    Failed {
        /// The toggled pair.
        key: FlightKey,
        /// Generation of the toggle.
        generation: u64,
        /// Why the write failed.
        error: Arc<Error>,
    },
}

impl ToggleEvent {
    /// The toggled pair.
    #[must_use]
    pub fn key(&self) -> &FlightKey {
        match self {
            Self::Confirmed { key, .. } | Self::Failed { key, .. } => key,
        }
    }

    /// Whether the write failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Speculative favorite state shown on top of the live lists.
#[derive(Debug, Clone, Copy)]
struct Speculation {
    is_favorite: bool,
    id: i64,
    generation: u64,
    /// Favorites version at or after the confirmed write.
    confirmed_at: Option<u64>,
}

impl Speculation {
    /// Whether a snapshot taken at `favorites_version` already reflects this write.
    fn settled_by(&self, favorites_version: u64) -> bool {
        self.confirmed_at
            .is_some_and(|confirmed| favorites_version >= confirmed)
    }
}

#[derive(Debug)]
struct Completion {
    key: FlightKey,
    generation: u64,
    result: Result<ToggleOutcome>,
    favorites_version: u64,
}

/// Holds the screen state and derives its lists.
#[derive(Debug)]
pub struct ViewStateCoordinator {
    query: FlightQueryService,
    toggle: FavoriteToggle,
    max_suggestions: usize,

    input: String,
    mode: Mode,
    origin: Option<Airport>,

    suggestions: Live<Airport>,
    last_suggestions: Vec<Airport>,
    flights_from_origin: Live<Flight>,
    favorite_flights: Live<Flight>,

    speculations: HashMap<FlightKey, Speculation>,
    next_generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl ViewStateCoordinator {
    /// Create a coordinator in favorites mode with empty input.
    ///
    /// Must be called from within a tokio runtime; the favorites list starts
    /// streaming immediately.
    #[must_use]
    pub fn new(query: FlightQueryService) -> Self {
        let toggle = FavoriteToggle::new(Arc::clone(query.repository()));
        let favorite_flights = query.all_favorite_flights();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            query,
            toggle,
            max_suggestions: 0,
            input: String::new(),
            mode: Mode::Favorites,
            origin: None,
            suggestions: Live::fixed(Vec::new()),
            last_suggestions: Vec::new(),
            flights_from_origin: Live::fixed(Vec::new()),
            favorite_flights,
            speculations: HashMap::new(),
            next_generation: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// Cap the number of suggestions returned (0 for no cap).
    #[must_use]
    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    // === User actions ===

    /// The search text changed.
    ///
    /// Clearing the text while showing origin results returns to favorites.
    /// A new suggestion query is issued every time.
    pub fn update_search_text(&mut self, text: impl Into<String>) {
        self.input = text.into();

        if self.input.is_empty() {
            self.last_suggestions.clear();
            if self.mode != Mode::Favorites {
                debug!("Search cleared, showing favorites");
                self.mode = Mode::Favorites;
                self.origin = None;
                self.flights_from_origin = Live::fixed(Vec::new());
            }
        } else {
            self.remember_suggestions();
        }

        self.suggestions = self.query.search_airports(&self.input);
    }

    /// The user picked `airport` as the origin.
    pub fn select_origin(&mut self, airport: &Airport) {
        info!("Showing flights from {}", airport.iata_code);
        self.mode = Mode::OriginResults;
        self.input.clone_from(&airport.iata_code);
        self.suggestions = Live::fixed(Vec::new());
        self.last_suggestions.clear();
        self.flights_from_origin = self.query.flights_from(airport);
        self.origin = Some(airport.clone());
    }

    /// The user tapped the favorite star of `flight` (as currently displayed).
    ///
    /// The flip is visible immediately through the list accessors; the write
    /// runs in the background and is reported by [`Self::poll_completions`]
    /// or [`Self::next_completion`]. The write completes even if the
    /// coordinator is dropped first.
    pub fn toggle_favorite(&mut self, flight: &Flight) -> ToggleTicket {
        let intent = ToggleIntent::plan(flight);
        let key = intent.key().clone();
        self.next_generation += 1;
        let generation = self.next_generation;

        self.speculations.insert(
            key.clone(),
            Speculation {
                is_favorite: intent.target_is_favorite(),
                id: NOT_FAVORITE_ID,
                generation,
                confirmed_at: None,
            },
        );
        debug!("Toggle #{} of {} shown optimistically", generation, key);

        let toggle = self.toggle.clone();
        let changes = self.query.repository().changes();
        let tx = self.completions_tx.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            let result = toggle.apply(&intent).await;
            let favorites_version = changes.borrow().favorites;
            // The coordinator may be gone; the write has landed regardless.
            let _ = tx.send(Completion {
                key: task_key,
                generation,
                result,
                favorites_version,
            });
        });

        ToggleTicket { key, generation }
    }

    /// Apply every toggle that has finished since the last call.
    pub fn poll_completions(&mut self) -> Vec<ToggleEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            events.push(self.apply_completion(completion));
        }
        self.prune_settled();
        events
    }

    /// Wait for the next toggle to finish and apply it.
    ///
    /// Returns `None` only if no completion can ever arrive.
    pub async fn next_completion(&mut self) -> Option<ToggleEvent> {
        let completion = self.completions_rx.recv().await?;
        let event = self.apply_completion(completion);
        self.prune_settled();
        Some(event)
    }

    // === Derived state ===

    /// Current search text.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Which list is showing.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The selected origin, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&Airport> {
        self.origin.as_ref()
    }

    /// Airport suggestions for the current input.
    ///
    /// While the latest query is pending, the last non-empty list of this
    /// search session is shown instead. A finished query is shown as is,
    /// even when it matched nothing; a failed one shows nothing.
    #[must_use]
    pub fn suggestions(&self) -> Vec<Airport> {
        let mut items = match self.suggestions.current() {
            LiveState::Pending => self.last_suggestions.clone(),
            LiveState::Ready(snapshot) => snapshot.items,
            LiveState::Failed(_) => Vec::new(),
        };
        if self.max_suggestions > 0 {
            items.truncate(self.max_suggestions);
        }
        items
    }

    /// Flights from the selected origin, with optimistic toggles applied.
    #[must_use]
    pub fn flights_from_origin(&self) -> Vec<Flight> {
        self.overlay(&self.flights_from_origin.current())
    }

    /// Saved favorites, with optimistic toggles applied.
    #[must_use]
    pub fn favorite_flights(&self) -> Vec<Flight> {
        self.overlay(&self.favorite_flights.current())
    }

    /// Favorites that could not be resolved against the catalog.
    #[must_use]
    pub fn favorite_issues(&self) -> Vec<ResolutionError> {
        self.favorite_flights
            .current()
            .snapshot()
            .map(|s| s.unresolved.clone())
            .unwrap_or_default()
    }

    /// Read error on the list currently showing, if any.
    #[must_use]
    pub fn list_error(&self) -> Option<Arc<Error>> {
        let state = match self.mode {
            Mode::Favorites => self.favorite_flights.current(),
            Mode::OriginResults => self.flights_from_origin.current(),
        };
        state.error().cloned()
    }

    /// Number of toggles shown but not yet confirmed.
    #[must_use]
    pub fn pending_toggles(&self) -> usize {
        self.speculations
            .values()
            .filter(|s| s.confirmed_at.is_none())
            .count()
    }

    /// A subscription to the raw suggestions stream.
    #[must_use]
    pub fn suggestions_stream(&self) -> Live<Airport> {
        self.suggestions.clone()
    }

    /// A subscription to the raw flights-from-origin stream.
    #[must_use]
    pub fn flights_from_origin_stream(&self) -> Live<Flight> {
        self.flights_from_origin.clone()
    }

    /// A subscription to the raw favorites stream.
    #[must_use]
    pub fn favorites_stream(&self) -> Live<Flight> {
        self.favorite_flights.clone()
    }

    // === Internals ===

    fn remember_suggestions(&mut self) {
        let items = self.suggestions.items();
        if !items.is_empty() {
            self.last_suggestions = items;
        }
    }

    fn overlay(&self, state: &LiveState<Flight>) -> Vec<Flight> {
        let Some(snapshot) = state.snapshot() else {
            return Vec::new();
        };
        let version = snapshot.versions.favorites;
        snapshot
            .items
            .iter()
            .map(|flight| {
                let mut flight = flight.clone();
                if let Some(spec) = self.speculations.get(&flight.key()) {
                    if !spec.settled_by(version) {
                        flight.is_favorite = spec.is_favorite;
                        flight.id = spec.id;
                    }
                }
                flight
            })
            .collect()
    }

    fn apply_completion(&mut self, completion: Completion) -> ToggleEvent {
        let Completion {
            key,
            generation,
            result,
            favorites_version,
        } = completion;
        let current = self
            .speculations
            .get(&key)
            .is_some_and(|s| s.generation == generation);

        match result {
            Ok(outcome) => {
                let is_favorite = matches!(outcome, ToggleOutcome::Added(_));
                if current {
                    if let Some(spec) = self.speculations.get_mut(&key) {
                        spec.id = outcome.flight_id();
                        spec.confirmed_at = Some(favorites_version);
                    }
                } else {
                    debug!("Toggle #{} of {} superseded", generation, key);
                }
                ToggleEvent::Confirmed {
                    key,
                    generation,
                    is_favorite,
                    id: outcome.flight_id(),
                }
            }
            Err(err) => {
                warn!("Toggle #{} of {} failed: {}", generation, key, err);
                if current {
                    self.speculations.remove(&key);
                }
                ToggleEvent::Failed {
                    key,
                    generation,
                    error: Arc::new(err),
                }
            }
        }
    }

    /// Drop confirmed overlays that every visible, ready list has caught up with.
    fn prune_settled(&mut self) {
        let mut states = vec![self.favorite_flights.current()];
        if self.mode == Mode::OriginResults {
            states.push(self.flights_from_origin.current());
        }
        let Some(seen) = states
            .iter()
            .filter_map(|state| state.snapshot().map(|s| s.versions.favorites))
            .min()
        else {
            return;
        };
        self.speculations.retain(|_, spec| !spec.settled_by(seen));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::repository::testing::{fco_jfk, repository_with, FlakyRepository};
    use crate::repository::FlightsRepository;
    use crate::storage::DuplicatePolicy;

    fn coordinator() -> ViewStateCoordinator {
        let repo = Arc::new(repository_with(&fco_jfk(), DuplicatePolicy::Reuse));
        ViewStateCoordinator::new(FlightQueryService::new(repo))
    }

    fn fco() -> Airport {
        fco_jfk().remove(0)
    }

    async fn origin_flights(coordinator: &ViewStateCoordinator) -> Vec<Flight> {
        coordinator
            .flights_from_origin_stream()
            .settled()
            .await
            .unwrap();
        coordinator.flights_from_origin()
    }

    #[tokio::test]
    async fn test_starts_in_favorites_mode() {
        let coordinator = coordinator();
        assert_eq!(coordinator.mode(), Mode::Favorites);
        assert_eq!(coordinator.input(), "");
        assert!(coordinator.origin().is_none());
        assert!(coordinator.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_select_origin_shows_destinations() {
        let mut coordinator = coordinator();
        coordinator.select_origin(&fco());

        assert_eq!(coordinator.mode(), Mode::OriginResults);
        assert_eq!(coordinator.input(), "FCO");
        assert_eq!(coordinator.origin().unwrap().iata_code, "FCO");

        let flights = origin_flights(&coordinator).await;
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].to.iata_code, "JFK");
        assert!(!flights[0].is_favorite);
        assert_eq!(flights[0].id, NOT_FAVORITE_ID);
    }

    #[tokio::test]
    async fn test_clearing_input_returns_to_favorites() {
        let mut coordinator = coordinator();
        coordinator.select_origin(&fco());
        origin_flights(&coordinator).await;

        coordinator.update_search_text("");
        assert_eq!(coordinator.mode(), Mode::Favorites);
        assert!(coordinator.origin().is_none());
        assert!(coordinator.flights_from_origin().is_empty());
    }

    #[tokio::test]
    async fn test_typing_keeps_mode_and_searches() {
        let mut coordinator = coordinator();
        coordinator.update_search_text("JF");
        assert_eq!(coordinator.mode(), Mode::Favorites);

        coordinator.suggestions_stream().settled().await.unwrap();
        let suggestions = coordinator.suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].iata_code, "JFK");
    }

    #[tokio::test]
    async fn test_suggestions_fall_back_while_pending() {
        let mut coordinator = coordinator();
        coordinator.update_search_text("JF");
        coordinator.suggestions_stream().settled().await.unwrap();

        coordinator.update_search_text("JFK");
        assert!(coordinator.suggestions_stream().current().is_pending());
        assert_eq!(coordinator.suggestions()[0].iata_code, "JFK");

        coordinator.update_search_text("");
        assert!(coordinator.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_empty_when_query_matches_nothing() {
        let mut coordinator = coordinator();
        coordinator.update_search_text("JF");
        coordinator.suggestions_stream().settled().await.unwrap();
        assert_eq!(coordinator.suggestions().len(), 1);

        coordinator.update_search_text("JFQ");
        let state = coordinator.suggestions_stream().settled().await.unwrap();
        assert!(state.items().is_empty());
        assert!(coordinator.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_max_suggestions() {
        let mut coordinator = coordinator().with_max_suggestions(1);
        coordinator.update_search_text("International");
        coordinator.suggestions_stream().settled().await.unwrap();
        assert_eq!(coordinator.suggestions().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_is_visible_before_write() {
        let mut coordinator = coordinator();
        coordinator.select_origin(&fco());
        let flight = origin_flights(&coordinator).await.remove(0);

        let ticket = coordinator.toggle_favorite(&flight);
        assert_eq!(ticket.key, FlightKey::new("FCO", "JFK"));
        assert!(coordinator.flights_from_origin()[0].is_favorite);
        assert_eq!(coordinator.pending_toggles(), 1);
    }

    #[tokio::test]
    async fn test_toggle_confirms_and_reaches_favorites() {
        let mut coordinator = coordinator();
        coordinator.select_origin(&fco());
        let flight = origin_flights(&coordinator).await.remove(0);

        coordinator.toggle_favorite(&flight);
        let event = coordinator.next_completion().await.unwrap();
        let ToggleEvent::Confirmed { is_favorite, id, .. } = event else {
            panic!("expected confirmation, got {event:?}");
        };
        assert!(is_favorite);
        assert_ne!(id, NOT_FAVORITE_ID);

        let state = coordinator
            .favorites_stream()
            .wait_for(|s| !s.items().is_empty())
            .await
            .unwrap();
        assert_eq!(state.items()[0].key(), FlightKey::new("FCO", "JFK"));
        assert_eq!(state.items()[0].id, id);

        coordinator
            .flights_from_origin_stream()
            .wait_for(|s| s.items().first().is_some_and(|f| f.is_favorite))
            .await
            .unwrap();
        coordinator.poll_completions();
        assert_eq!(coordinator.pending_toggles(), 0);
        assert_eq!(coordinator.flights_from_origin()[0].id, id);
        assert_eq!(coordinator.favorite_flights()[0].id, id);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_original() {
        let mut coordinator = coordinator();
        coordinator.select_origin(&fco());
        let original = origin_flights(&coordinator).await.remove(0);

        coordinator.toggle_favorite(&original);
        coordinator.next_completion().await.unwrap();
        let favorited = coordinator.flights_from_origin().remove(0);
        assert!(favorited.is_favorite);

        coordinator.toggle_favorite(&favorited);
        coordinator.next_completion().await.unwrap();
        coordinator
            .flights_from_origin_stream()
            .wait_for(|s| s.items().first().is_some_and(|f| !f.is_favorite))
            .await
            .unwrap();

        let restored = coordinator.flights_from_origin().remove(0);
        assert_eq!(restored, original);
        let repo = coordinator.query.repository();
        assert_eq!(repo.favorite_id("FCO", "JFK").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_toggle_reverts_and_reports() {
        crate::logging::init_test_logging();
        let flaky = Arc::new(FlakyRepository::new(repository_with(
            &fco_jfk(),
            DuplicatePolicy::Reuse,
        )));
        let mut coordinator = ViewStateCoordinator::new(FlightQueryService::new(
            Arc::clone(&flaky) as Arc<dyn FlightsRepository>,
        ));
        coordinator.select_origin(&fco());
        let flight = origin_flights(&coordinator).await.remove(0);

        coordinator.toggle_favorite(&flight);
        assert!(coordinator.flights_from_origin()[0].is_favorite);

        let event = coordinator.next_completion().await.unwrap();
        assert!(event.is_failure());
        assert_eq!(event.key(), &FlightKey::new("FCO", "JFK"));
        assert!(!coordinator.flights_from_origin()[0].is_favorite);
        assert_eq!(coordinator.pending_toggles(), 0);

        flaky.failing.store(false, Ordering::SeqCst);
        assert_eq!(flaky.favorite_id("FCO", "JFK").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_superseded_completion_keeps_newer_overlay() {
        let mut coordinator = coordinator();
        let key = FlightKey::new("FCO", "JFK");
        coordinator.speculations.insert(
            key.clone(),
            Speculation {
                is_favorite: false,
                id: NOT_FAVORITE_ID,
                generation: 2,
                confirmed_at: None,
            },
        );

        let event = coordinator.apply_completion(Completion {
            key: key.clone(),
            generation: 1,
            result: Err(Error::StorageUnavailable("disk I/O error".into())),
            favorites_version: 0,
        });
        assert!(event.is_failure());
        assert!(coordinator.speculations.contains_key(&key));

        coordinator.apply_completion(Completion {
            key: key.clone(),
            generation: 1,
            result: Ok(ToggleOutcome::Added(9)),
            favorites_version: 1,
        });
        let spec = coordinator.speculations[&key];
        assert_eq!(spec.generation, 2);
        assert!(spec.confirmed_at.is_none());
        assert_eq!(coordinator.pending_toggles(), 1);
    }

    fn flaky_coordinator() -> (ViewStateCoordinator, Arc<FlakyRepository>) {
        let flaky = Arc::new(FlakyRepository::new(repository_with(
            &fco_jfk(),
            DuplicatePolicy::Reuse,
        )));
        let coordinator = ViewStateCoordinator::new(FlightQueryService::new(
            Arc::clone(&flaky) as Arc<dyn FlightsRepository>,
        ));
        (coordinator, flaky)
    }

    #[tokio::test]
    async fn test_read_failure_is_reported_on_its_list() {
        let (mut coordinator, flaky) = flaky_coordinator();
        flaky.failing.store(false, Ordering::SeqCst);
        flaky.failing_destinations.store(true, Ordering::SeqCst);

        coordinator.favorites_stream().settled().await.unwrap();
        assert!(coordinator.list_error().is_none());

        coordinator.select_origin(&fco());
        coordinator
            .flights_from_origin_stream()
            .settled()
            .await
            .unwrap();
        let err = coordinator.list_error().unwrap();
        assert!(err.to_string().contains("disk I/O error"));
        assert!(coordinator.flights_from_origin().is_empty());

        flaky.add_favorite("JFK", "FCO").await.unwrap();
        let state = coordinator
            .favorites_stream()
            .wait_for(|s| !s.items().is_empty())
            .await
            .unwrap();
        assert_eq!(state.items()[0].key(), FlightKey::new("JFK", "FCO"));

        coordinator.update_search_text("");
        assert_eq!(coordinator.mode(), Mode::Favorites);
        assert!(coordinator.list_error().is_none());
    }

    #[tokio::test]
    async fn test_confirmed_overlay_pruned_when_origin_list_failed() {
        let (mut coordinator, flaky) = flaky_coordinator();
        flaky.failing.store(false, Ordering::SeqCst);
        flaky.failing_destinations.store(true, Ordering::SeqCst);

        coordinator.select_origin(&fco());
        coordinator
            .flights_from_origin_stream()
            .settled()
            .await
            .unwrap();
        assert!(coordinator.list_error().is_some());

        let mut airports = fco_jfk();
        let jfk = airports.pop().unwrap();
        let fco = airports.pop().unwrap();
        coordinator.toggle_favorite(&Flight::new(fco, jfk));
        assert!(!coordinator.next_completion().await.unwrap().is_failure());

        coordinator
            .favorites_stream()
            .wait_for(|s| !s.items().is_empty())
            .await
            .unwrap();
        coordinator.poll_completions();
        assert!(coordinator.speculations.is_empty());
    }
}
