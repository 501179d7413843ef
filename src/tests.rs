//! Engine scenarios against scripted collaborators. The clock is paused, so
//! timers only fire when a test advances it.

use crate::agencies::Agency;
use crate::coloring::{EdgeId, PaintExpression, RequestId};
use crate::configuration::Configuration;
use crate::engine::{Engine, EngineHandle, Input, Key, ViewState};
use crate::gestures::{InputModality, PointerSample, RawGesture};
use crate::hover::{HoverPhase, PROTOCOL_ALERT};
use crate::loading::LoadingState;
use crate::map_layer::{
    Cursor, MapError, MapEvent, MapLayer, RenderedFeature, ScreenPoint, TRANSIT_LAYER_ID,
};
use crate::service::{
    AgencyService, CalculateRequest, CalculateResponse, DetailService, ReachabilityService,
    ServiceError,
};
use crate::store::{LatLng, OptionsAction};
use crate::trip_details::{
    parse_detail_response, DetailResult, DetailView, GetDetailsRequest, TripDetails,
    TripDetailsWalking,
};
use futures::future::{AbortRegistration, Abortable, BoxFuture};
use futures::FutureExt;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

async fn await_reply<T>(rx: oneshot::Receiver<Result<T, ServiceError>>) -> Result<T, ServiceError> {
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Status(503)),
    }
}

#[derive(Default)]
struct Calls {
    calculate: Vec<(CalculateRequest, Option<Reply<CalculateResponse>>)>,
    details: Vec<(GetDetailsRequest, Option<Reply<Option<DetailResult>>>)>,
}

/// Every call stays pending until the test answers it.
#[derive(Default)]
struct ScriptedService {
    agencies: Option<Vec<Agency>>,
    calls: Mutex<Calls>,
}

impl ScriptedService {
    fn calculate_requests(&self) -> Vec<CalculateRequest> {
        let calls = self.calls.lock().unwrap();
        calls.calculate.iter().map(|(r, _)| r.clone()).collect()
    }

    fn detail_requests(&self) -> Vec<GetDetailsRequest> {
        let calls = self.calls.lock().unwrap();
        calls.details.iter().map(|(r, _)| r.clone()).collect()
    }

    fn answer_calculate(&self, index: usize, result: Result<CalculateResponse, ServiceError>) {
        let reply = self.calls.lock().unwrap().calculate[index].1.take().unwrap();
        let _ = reply.send(result);
    }

    fn answer_details(&self, index: usize, result: Result<Option<DetailResult>, ServiceError>) {
        let reply = self.calls.lock().unwrap().details[index].1.take().unwrap();
        let _ = reply.send(result);
    }

    /// The caller dropped its side of the detail call without an answer.
    fn detail_abandoned(&self, index: usize) -> bool {
        let calls = self.calls.lock().unwrap();
        calls.details[index].1.as_ref().map_or(false, |reply| reply.is_closed())
    }
}

impl ReachabilityService for ScriptedService {
    fn calculate(
        &self,
        request: CalculateRequest,
    ) -> BoxFuture<'static, Result<CalculateResponse, ServiceError>> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().calculate.push((request, Some(tx)));
        await_reply(rx).boxed()
    }
}

impl DetailService for ScriptedService {
    fn details(
        &self,
        request: GetDetailsRequest,
        abort: AbortRegistration,
    ) -> BoxFuture<'static, Result<Option<DetailResult>, ServiceError>> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().details.push((request, Some(tx)));
        Abortable::new(await_reply(rx), abort)
            .map(|outcome| outcome.unwrap_or(Err(ServiceError::Cancelled)))
            .boxed()
    }
}

impl AgencyService for ScriptedService {
    fn agencies(&self) -> BoxFuture<'static, Result<Vec<Agency>, ServiceError>> {
        match self.agencies.clone() {
            Some(list) => futures::future::ready(Ok(list)).boxed(),
            None => futures::future::pending().boxed(),
        }
    }
}

#[derive(Default)]
struct MapLog {
    layer_adds: usize,
    /// Paints left to fail with the missing-layer error.
    not_ready: usize,
    paint_attempts: usize,
    painted: Option<PaintExpression>,
    path: Option<geojson::GeoJson>,
    cursor: Option<Cursor>,
    /// Hit-test table keyed by screen x.
    features: FxHashMap<u32, EdgeId>,
}

struct RecordingMap(Arc<Mutex<MapLog>>);

impl MapLayer for RecordingMap {
    fn add_transit_layer(&mut self) -> Result<(), MapError> {
        self.0.lock().unwrap().layer_adds += 1;
        Ok(())
    }

    fn add_path_layer(&mut self) -> Result<(), MapError> {
        Ok(())
    }

    fn set_edge_colors(&mut self, paint: &PaintExpression) -> Result<(), MapError> {
        let mut log = self.0.lock().unwrap();
        log.paint_attempts += 1;
        if log.not_ready > 0 {
            log.not_ready -= 1;
            return Err(MapError::from_message(
                TRANSIT_LAYER_ID,
                "The layer 'transit-layer' does not exist in the map's style and cannot be styled.",
            ));
        }
        log.painted = Some(paint.clone());
        Ok(())
    }

    fn set_path_data(&mut self, path: Option<&geojson::GeoJson>) {
        self.0.lock().unwrap().path = path.cloned();
    }

    fn query_rendered_features(&self, point: ScreenPoint, _radius_px: f64) -> Vec<RenderedFeature> {
        let log = self.0.lock().unwrap();
        log.features
            .get(&(point.x as u32))
            .map(|&id| RenderedFeature { id: Some(id) })
            .into_iter()
            .collect()
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.0.lock().unwrap().cursor = Some(cursor);
    }
}

struct Harness {
    handle: EngineHandle,
    service: Arc<ScriptedService>,
    map: Arc<Mutex<MapLog>>,
    engine: JoinHandle<RecordingMap>,
}

impl Harness {
    async fn start(
        config: Configuration,
        service: ScriptedService,
        map: MapLog,
        modality: InputModality,
    ) -> Harness {
        let service = Arc::new(service);
        let map = Arc::new(Mutex::new(map));
        let (engine, handle) =
            Engine::new(config, service.clone(), RecordingMap(map.clone()), modality);
        let engine = tokio::spawn(engine.run());

        let harness = Harness {
            handle,
            service,
            map,
            engine,
        };
        harness.send(Input::Map(MapEvent::Loaded)).await;
        harness
    }

    async fn send(&self, input: Input) {
        self.handle.send(input).unwrap();
        settle().await;
    }

    fn view(&self) -> ViewState {
        self.handle.view()
    }

    fn map(&self) -> MutexGuard<'_, MapLog> {
        self.map.lock().unwrap()
    }
}

/// Lets spawned calls and the event loop run to quiescence.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}

fn london() -> LatLng {
    LatLng::from_lat_lng(42.9849, -81.2453)
}

fn complete_config() -> Configuration {
    let mut config = Configuration::default();
    config.options.agencies = Some(["LTC".to_string()].into());
    config.options.modes = Some(["bus".to_string()].into());
    config
}

fn request_id(index: u64) -> RequestId {
    RequestId(json!({ "rs_list_index": index, "city": "London" }))
}

fn edge_times(index: u64, times: &[(u64, u32)]) -> CalculateResponse {
    CalculateResponse {
        request_id: request_id(index),
        edge_times: times.iter().map(|&(edge, secs)| (EdgeId(edge), secs)).collect(),
    }
}

fn at(x: f64) -> PointerSample {
    PointerSample {
        point: ScreenPoint::new(x, 0.0),
        lat_lng: LatLng::from_lat_lng(42.98, -81.2 - x / 1000.0),
        alt_key: false,
    }
}

fn path() -> geojson::GeoJson {
    json!({"type": "LineString", "coordinates": [[-81.24, 42.98], [-81.25, 42.99]]})
        .to_string()
        .parse()
        .unwrap()
}

fn walk(time: f64) -> DetailResult {
    DetailResult {
        details: vec![TripDetails::Walking(TripDetailsWalking {
            time,
            length: 120.0,
        })],
        path: Some(path()),
    }
}

fn two_edges() -> MapLog {
    MapLog {
        features: [(10, EdgeId(123)), (20, EdgeId(456)), (30, EdgeId(789))]
            .into_iter()
            .collect(),
        ..MapLog::default()
    }
}

async fn colored(map: MapLog) -> Harness {
    let h = Harness::start(complete_config(), ScriptedService::default(), map, InputModality::Mouse)
        .await;
    h.service
        .answer_calculate(0, Ok(edge_times(0, &[(123, 540), (456, 600)])));
    settle().await;
    h
}

#[tokio::test(start_paused = true)]
async fn recolor_applies_and_clears_after_render() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;

    let requests = h.service.calculate_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!((requests[0].latitude, requests[0].longitude), (42.9849, -81.2453));
    assert_eq!(requests[0].previous_request_id, None);
    assert_eq!(h.view().loading, LoadingState::Pending);

    h.service.answer_calculate(0, Ok(edge_times(0, &[(123, 540)])));
    settle().await;
    let view = h.view();
    assert_eq!(
        view.coloring.as_ref().map(|c| c.seconds(EdgeId(123))),
        Some(Some(540))
    );
    assert!(h.map().painted.is_some());
    // painted, not yet rendered
    assert_eq!(view.loading, LoadingState::Pending);

    h.send(Input::Map(MapEvent::Render)).await;
    advance(Duration::from_millis(299)).await;
    assert_eq!(h.view().loading, LoadingState::Pending);
    advance(Duration::from_millis(1)).await;
    assert_eq!(h.view().loading, LoadingState::Idle);
    assert_eq!(h.view().last_good_origin, london());
}

#[tokio::test(start_paused = true)]
async fn busy_clears_on_fallback_without_render() {
    let h = colored(MapLog::default()).await;
    assert_eq!(h.view().loading, LoadingState::Pending);

    advance(Duration::from_millis(2999)).await;
    assert_eq!(h.view().loading, LoadingState::Pending);
    advance(Duration::from_millis(1)).await;
    assert_eq!(h.view().loading, LoadingState::Idle);
}

#[tokio::test(start_paused = true)]
async fn incomplete_options_issue_nothing() {
    let h = Harness::start(
        Configuration::default(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;

    h.send(Input::SetOrigin(LatLng::from_lat_lng(43.0, -81.3))).await;
    h.send(Input::Options(OptionsAction::SetDuration(1800))).await;

    assert!(h.service.calculate_requests().is_empty());
    assert_eq!(h.view().recolor_requests, 0);
    assert_eq!(h.view().loading, LoadingState::Idle);
}

#[tokio::test(start_paused = true)]
async fn loaded_agencies_complete_options_once() {
    let agency = |code: &str, city: &str| Agency {
        public_name: code.to_lowercase(),
        short_code: code.to_string(),
        city: city.to_string(),
    };
    let service = ScriptedService {
        agencies: Some(vec![agency("LTC", "London"), agency("GRT", "Kitchener-Waterloo")]),
        ..ScriptedService::default()
    };
    let h = Harness::start(
        Configuration::default(),
        service,
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;

    let requests = h.service.calculate_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].agencies, vec!["GRT", "LTC"]);
    assert_eq!(requests[0].modes, vec!["bus", "ferry", "rail", "subway", "tram"]);
    assert_eq!(h.view().agencies, vec![agency("LTC", "London")]);
}

#[tokio::test(start_paused = true)]
async fn stale_recolor_result_is_discarded() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;
    let moved = LatLng::from_lat_lng(43.01, -81.2);
    h.send(Input::SetOrigin(moved)).await;

    let requests = h.service.calculate_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].latitude, 43.01);

    h.service.answer_calculate(1, Ok(edge_times(1, &[(1, 100)])));
    settle().await;
    h.service.answer_calculate(0, Ok(edge_times(0, &[(2, 200)])));
    settle().await;

    let view = h.view();
    let coloring = view.coloring.unwrap();
    assert_eq!(coloring.seconds(EdgeId(1)), Some(100));
    assert_eq!(coloring.seconds(EdgeId(2)), None);
    assert_eq!(view.last_good_origin, moved);

    h.send(Input::Options(OptionsAction::SetTransferPenalty(120))).await;
    let requests = h.service.calculate_requests();
    assert_eq!(requests[2].previous_request_id, Some(request_id(1)));
    assert_eq!(requests[2].transfer_penalty_secs, 120);
}

#[tokio::test(start_paused = true)]
async fn failed_recolor_clears_busy_and_accepts_origin() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;
    let moved = LatLng::from_lat_lng(43.01, -81.2);
    h.send(Input::SetOrigin(moved)).await;

    h.service.answer_calculate(1, Err(ServiceError::Status(502)));
    settle().await;
    let view = h.view();
    assert_eq!(view.loading, LoadingState::Idle);
    assert_eq!(view.coloring, None);
    assert_eq!(view.last_good_origin, moved);

    advance(Duration::from_secs(20)).await;
    assert!(!h.view().stuck);
}

#[tokio::test(start_paused = true)]
async fn failed_recolor_settles_the_view() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;
    assert!(!h.view().recolor_settled());

    h.service.answer_calculate(0, Err(ServiceError::Status(500)));
    settle().await;
    let view = h.view();
    assert!(view.recolor_settled());
    assert!(view.coloring.is_none() && !view.stuck);
}

#[tokio::test(start_paused = true)]
async fn reissue_after_safety_timeout_restarts_stuck_clock() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;
    advance(Duration::from_secs(12)).await;
    assert_eq!(h.view().loading, LoadingState::Idle);

    h.send(Input::SetOrigin(LatLng::from_lat_lng(43.0, -81.3))).await;
    assert_eq!(h.view().loading, LoadingState::Pending);

    // first request's deadline passes without tripping
    advance(Duration::from_millis(3_001)).await;
    assert!(!h.view().stuck);
    assert_eq!(h.view().loading, LoadingState::Pending);

    advance(Duration::from_secs(12)).await;
    assert!(h.view().stuck);
    assert_eq!(h.view().loading, LoadingState::StuckPending);
}

#[tokio::test(start_paused = true)]
async fn hung_recolor_goes_stuck_then_force_reset() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;
    assert_eq!(h.view().loading, LoadingState::Pending);

    advance(Duration::from_secs(10)).await;
    assert_eq!(h.view().loading, LoadingState::Idle);
    assert!(!h.view().stuck);

    advance(Duration::from_secs(5)).await;
    assert!(!h.view().stuck);
    advance(Duration::from_millis(1)).await;
    assert!(h.view().stuck);
    assert_eq!(h.view().loading, LoadingState::StuckPending);

    h.send(Input::ForceReset).await;
    assert!(!h.view().stuck);
    let requests = h.service.calculate_requests();
    assert_eq!(requests.len(), 2);
    assert!((requests[1].latitude - (42.9849 + 0.0001)).abs() < 1e-9);
    assert!((requests[1].longitude - (-81.2453 + 0.0001)).abs() < 1e-9);

    h.service.answer_calculate(1, Ok(edge_times(1, &[(5, 50)])));
    settle().await;
    advance(Duration::from_secs(3)).await;
    assert_eq!(h.view().loading, LoadingState::Idle);

    // the original call finally answers; too late to matter
    h.service.answer_calculate(0, Ok(edge_times(0, &[(6, 60)])));
    settle().await;
    assert_eq!(h.view().coloring.unwrap().seconds(EdgeId(6)), None);
}

#[tokio::test(start_paused = true)]
async fn missing_layer_is_retried_once() {
    let h = colored(MapLog {
        not_ready: 1,
        ..MapLog::default()
    })
    .await;
    {
        let map = h.map();
        assert_eq!(map.paint_attempts, 1);
        // added on load, then re-added after the failure
        assert_eq!(map.layer_adds, 2);
        assert!(map.painted.is_none());
    }
    assert_eq!(h.view().loading, LoadingState::Idle);

    advance(Duration::from_millis(1999)).await;
    assert_eq!(h.map().paint_attempts, 1);
    advance(Duration::from_millis(1)).await;
    assert_eq!(h.map().paint_attempts, 2);
    assert!(h.map().painted.is_some());

    advance(Duration::from_secs(10)).await;
    assert_eq!(h.map().paint_attempts, 2);
    assert_eq!(h.map().layer_adds, 2);
}

#[tokio::test(start_paused = true)]
async fn second_layer_failure_is_not_retried() {
    let h = colored(MapLog {
        not_ready: 2,
        ..MapLog::default()
    })
    .await;

    advance(Duration::from_secs(2)).await;
    advance(Duration::from_secs(10)).await;
    let map = h.map();
    assert_eq!(map.paint_attempts, 2);
    assert_eq!(map.layer_adds, 2);
    assert!(map.painted.is_none());
}

#[tokio::test(start_paused = true)]
async fn newer_hover_cancels_older_detail() {
    let h = colored(two_edges()).await;

    h.send(Input::Gesture(RawGesture::MouseOver(at(10.0)))).await;
    let requests = h.service.detail_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request_id, request_id(0));
    assert_eq!(requests[0].latlng, at(10.0).lat_lng);
    assert_eq!(h.view().hover, HoverPhase::Pending);

    h.send(Input::Gesture(RawGesture::MouseOver(at(20.0)))).await;
    assert_eq!(h.service.detail_requests().len(), 2);

    h.service.answer_details(0, Ok(Some(walk(60.0))));
    settle().await;
    assert_eq!(h.view().detail, None);
    assert!(h.map().path.is_none());

    h.service.answer_details(1, Ok(Some(walk(90.0))));
    settle().await;
    let view = h.view();
    assert_eq!(view.hover, HoverPhase::Resolved);
    assert_eq!(
        view.detail,
        Some(DetailView {
            details: walk(90.0).details,
            arrival_secs: 600,
        })
    );
    assert_eq!(h.map().path, Some(path()));
}

#[tokio::test(start_paused = true)]
async fn unreachable_edges_and_alt_hover_are_ignored() {
    let h = colored(two_edges()).await;

    h.send(Input::Gesture(RawGesture::MouseOver(at(30.0)))).await;
    assert!(h.service.detail_requests().is_empty());
    assert_eq!(h.map().cursor, Some(Cursor::Crosshair));

    let mut sample = at(10.0);
    sample.alt_key = true;
    h.send(Input::Gesture(RawGesture::MouseOver(sample))).await;
    assert!(h.service.detail_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unparsable_details_raise_alert() {
    let h = colored(two_edges()).await;
    h.send(Input::Gesture(RawGesture::Click(at(10.0)))).await;

    let err = parse_detail_response("<html>502 Bad Gateway</html>").unwrap_err();
    h.service.answer_details(0, Err(err.into()));
    settle().await;
    let view = h.view();
    assert_eq!(view.hover, HoverPhase::Errored);
    assert_eq!(view.alert.as_deref(), Some(PROTOCOL_ALERT));

    h.send(Input::DismissAlert).await;
    assert_eq!(h.view().alert, None);
}

#[tokio::test(start_paused = true)]
async fn escape_and_leave_dismiss_detail() {
    let h = colored(two_edges()).await;

    h.send(Input::Gesture(RawGesture::MouseOver(at(10.0)))).await;
    h.service.answer_details(0, Ok(Some(walk(60.0))));
    settle().await;
    assert!(h.view().detail.is_some());

    h.send(Input::KeyDown(Key::Escape)).await;
    assert_eq!(h.view().detail, None);
    assert_eq!(h.view().hover, HoverPhase::Idle);
    assert!(h.map().path.is_none());

    h.send(Input::Gesture(RawGesture::MouseOver(at(20.0)))).await;
    h.send(Input::Gesture(RawGesture::PointerLeave)).await;
    h.service.answer_details(1, Ok(Some(walk(90.0))));
    settle().await;
    assert_eq!(h.view().detail, None);
    assert_eq!(h.view().hover, HoverPhase::Idle);
    assert_eq!(h.map().cursor, Some(Cursor::Default));
}

#[tokio::test(start_paused = true)]
async fn click_on_empty_map_clears_detail() {
    let h = colored(two_edges()).await;
    h.send(Input::Gesture(RawGesture::Click(at(10.0)))).await;
    h.service.answer_details(0, Ok(Some(walk(60.0))));
    settle().await;
    assert!(h.view().detail.is_some());

    // hovering over nothing keeps the popup; clicking nothing closes it
    h.send(Input::Gesture(RawGesture::MouseOver(at(50.0)))).await;
    assert!(h.view().detail.is_some());
    h.send(Input::Gesture(RawGesture::Click(at(50.0)))).await;
    assert_eq!(h.view().detail, None);
}

#[tokio::test(start_paused = true)]
async fn new_coloring_clears_detail() {
    let h = colored(two_edges()).await;
    h.send(Input::Gesture(RawGesture::MouseOver(at(10.0)))).await;
    h.service.answer_details(0, Ok(Some(walk(60.0))));
    settle().await;
    assert!(h.map().path.is_some());

    h.send(Input::SetOrigin(LatLng::from_lat_lng(43.0, -81.3))).await;
    h.service.answer_calculate(1, Ok(edge_times(1, &[(123, 300)])));
    settle().await;
    assert_eq!(h.view().detail, None);
    assert!(h.map().path.is_none());
}

#[tokio::test(start_paused = true)]
async fn touch_double_tap_moves_origin() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Touch,
    )
    .await;

    h.send(Input::Gesture(RawGesture::Tap(at(10.0)))).await;
    advance(Duration::from_millis(100)).await;
    h.send(Input::Gesture(RawGesture::Tap(at(12.0)))).await;

    let requests = h.service.calculate_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].latitude, at(12.0).lat_lng.latitude);
    assert_eq!(h.view().origin, at(12.0).lat_lng);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_timers() {
    let h = Harness::start(
        complete_config(),
        ScriptedService::default(),
        MapLog::default(),
        InputModality::Mouse,
    )
    .await;
    assert_eq!(h.view().loading, LoadingState::Pending);

    h.handle.send(Input::Shutdown).unwrap();
    let Harness { handle, engine, .. } = h;
    engine.await.unwrap();
    assert_eq!(handle.view().loading, LoadingState::Idle);

    advance(Duration::from_secs(20)).await;
    assert!(!handle.view().stuck);
    assert!(handle.send(Input::ForceReset).is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_tears_down() {
    let h = colored(two_edges()).await;
    h.send(Input::Gesture(RawGesture::MouseOver(at(10.0)))).await;
    assert_eq!(h.view().hover, HoverPhase::Pending);
    assert!(!h.service.detail_abandoned(0));

    let Harness {
        handle,
        service,
        engine,
        ..
    } = h;
    let view = handle.subscribe();
    drop(handle);

    let finished = tokio::time::timeout(Duration::from_secs(60), engine).await;
    assert!(finished.is_ok_and(|joined| joined.is_ok()));
    settle().await;
    assert_eq!(view.borrow().loading, LoadingState::Idle);
    assert!(service.detail_abandoned(0));
}
