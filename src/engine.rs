//! The event loop. Every piece of state is owned here and mutated only from
//! [`Engine::run`]; network calls and timers are tasks that post an [`Event`]
//! back when they finish.

use crate::agencies::{self, Agency};
use crate::coloring::{ColorRamp, ColoringResult};
use crate::configuration::Configuration;
use crate::gestures::{Gesture, GestureDispatcher, InputModality, RawGesture};
use crate::hover::{HoverController, HoverPhase};
use crate::loading::{ClearReason, LoadingMonitor, LoadingState};
use crate::map_layer::{MapEvent, MapLayer};
use crate::recolor::{RecolorController, RecolorOutcome};
use crate::reconcile::{ApplyOutcome, LayerReconciler};
use crate::service::{
    AgencyService, CalculateResponse, DetailService, ReachabilityService, ServiceError,
};
use crate::store::{LatLng, OptionsAction, OriginParameterStore};
use crate::timers::{TimerFired, TimerKind, Timers};
use crate::trip_details::{DetailResult, DetailView};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other,
}

/// Everything the outside world can tell the engine.
#[derive(Clone, Debug)]
pub enum Input {
    SetOrigin(LatLng),
    Options(OptionsAction),
    Gesture(RawGesture),
    KeyDown(Key),
    Map(MapEvent),
    ForceReset,
    DismissAlert,
    Shutdown,
}

enum Event {
    Input(Input),
    AgenciesLoaded(Result<Vec<Agency>, ServiceError>),
    RecolorSettled {
        seq: u64,
        origin: LatLng,
        ramp: ColorRamp,
        result: Result<CalculateResponse, ServiceError>,
    },
    DetailSettled {
        id: u64,
        result: Result<Option<DetailResult>, ServiceError>,
    },
    Timer(TimerFired),
}

impl From<TimerFired> for Event {
    fn from(fired: TimerFired) -> Self {
        Event::Timer(fired)
    }
}

/// What a UI would render.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub loading: LoadingState,
    pub stuck: bool,
    pub origin: LatLng,
    pub last_good_origin: LatLng,
    pub coloring: Option<Arc<ColoringResult>>,
    pub hover: HoverPhase,
    pub detail: Option<DetailView>,
    pub alert: Option<String>,
    pub agencies: Vec<Agency>,
    pub recolor_requests: u64,
}

impl ViewState {
    /// True once a recolor has produced edge times, failed, or gone stuck.
    pub fn recolor_settled(&self) -> bool {
        self.coloring.is_some()
            || self.stuck
            || (self.recolor_requests > 0 && self.loading == LoadingState::Idle)
    }
}

#[derive(Clone)]
pub struct EngineHandle {
    inputs: mpsc::UnboundedSender<Input>,
    view: watch::Receiver<ViewState>,
}

#[derive(thiserror::Error, Debug)]
#[error("the engine has shut down")]
pub struct EngineClosed;

impl EngineHandle {
    pub fn send(&self, input: Input) -> Result<(), EngineClosed> {
        self.inputs.send(input).map_err(|_| EngineClosed)
    }

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }
}

pub struct Engine<S, M> {
    config: Configuration,
    service: Arc<S>,
    map: M,
    store: OriginParameterStore,
    recolor: RecolorController,
    hover: HoverController,
    reconciler: LayerReconciler,
    monitor: LoadingMonitor,
    gestures: GestureDispatcher,
    timers: Timers<Event>,
    agencies: Vec<Agency>,
    inputs: mpsc::UnboundedReceiver<Input>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    view: watch::Sender<ViewState>,
}

impl<S, M> Engine<S, M>
where
    S: ReachabilityService + DetailService + AgencyService,
    M: MapLayer,
{
    pub fn new(
        config: Configuration,
        service: Arc<S>,
        map: M,
        modality: InputModality,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (input_tx, inputs) = mpsc::unbounded_channel();
        let store = OriginParameterStore::new(config.start_location, config.options.clone());
        let monitor = LoadingMonitor::new(config.timings.stuck_threshold);

        let initial = ViewState {
            loading: monitor.state(),
            stuck: false,
            origin: store.origin(),
            last_good_origin: store.last_good_origin(),
            coloring: None,
            hover: HoverPhase::Idle,
            detail: None,
            alert: None,
            agencies: vec![],
            recolor_requests: 0,
        };
        let (view, view_rx) = watch::channel(initial);

        let engine = Engine {
            hover: HoverController::new(config.hit_radius_px),
            timers: Timers::new(tx.clone()),
            gestures: GestureDispatcher::new(modality),
            recolor: RecolorController::new(),
            reconciler: LayerReconciler::new(),
            agencies: vec![],
            config,
            service,
            map,
            store,
            monitor,
            inputs,
            tx,
            rx,
            view,
        };
        (
            engine,
            EngineHandle {
                inputs: input_tx,
                view: view_rx,
            },
        )
    }

    /// Runs until [`Input::Shutdown`] or until every [`EngineHandle`] is gone,
    /// then tears down and hands the map back.
    pub async fn run(mut self) -> M {
        self.fetch_agencies();
        self.issue_recolor();
        self.publish();

        loop {
            // the engine holds its own event sender, so only the input side closes
            let event = tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(Input::Shutdown) | None => break,
                    Some(input) => Event::Input(input),
                },
                Some(event) = self.rx.recv() => event,
            };
            self.handle(event);
            self.publish();
        }

        self.teardown();
        self.publish();
        self.map
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Input(input) => self.on_input(input),
            Event::AgenciesLoaded(result) => self.on_agencies(result),
            Event::RecolorSettled {
                seq,
                origin,
                ramp,
                result,
            } => self.on_recolor_settled(seq, origin, &ramp, result),
            Event::DetailSettled { id, result } => {
                if let Some(err) = self.hover.on_settled(id, result, &mut self.map) {
                    report_unhandled(anyhow::Error::new(err).context("detail request failed"));
                }
            }
            Event::Timer(fired) => self.on_timer(fired),
        }
    }

    fn on_input(&mut self, input: Input) {
        match input {
            Input::SetOrigin(origin) => {
                info!("Origin set to ({}, {})", origin.latitude, origin.longitude);
                self.store.set_origin(origin);
                self.issue_recolor();
            }
            Input::Options(action) => {
                self.store.apply(action);
                self.issue_recolor();
            }
            Input::Gesture(raw) => {
                if !self.reconciler.is_loaded() {
                    return;
                }
                for gesture in self.gestures.dispatch(raw, Instant::now()) {
                    self.on_gesture(gesture);
                }
            }
            Input::KeyDown(Key::Escape) => self.hover.dismiss(&mut self.map),
            Input::KeyDown(Key::Other) => {}
            Input::Map(event) => self.on_map_event(event),
            Input::ForceReset => self.force_reset(),
            Input::DismissAlert => self.hover.clear_alert(),
            Input::Shutdown => {}
        }
    }

    fn on_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::Detail(event) => {
                let coloring = self.reconciler.active().cloned();
                let Some(issue) = self.hover.on_pointer(event, &mut self.map, coloring.as_deref())
                else {
                    return;
                };
                debug!("Requesting details for edge {}", issue.edge);
                let call = self.service.details(issue.request, issue.registration);
                let tx = self.tx.clone();
                let id = issue.id;
                tokio::spawn(async move {
                    let result = call.await;
                    let _ = tx.send(Event::DetailSettled { id, result });
                });
            }
            Gesture::SetOrigin(origin) => self.on_input(Input::SetOrigin(origin)),
            Gesture::Leave => self.hover.dismiss(&mut self.map),
        }
    }

    fn on_map_event(&mut self, event: MapEvent) {
        match event {
            MapEvent::Loaded => {
                if let Err(e) = self.reconciler.on_map_loaded(&mut self.map) {
                    warn!("Adding layers on load failed: {e}");
                }
                if self.reconciler.has_queued() {
                    self.apply_coloring(true);
                }
            }
            MapEvent::Render => {
                if let Some(seq) = self.reconciler.take_render_wait() {
                    if seq == self.recolor.latest_seq() {
                        let deadline = Instant::now() + self.config.timings.render_debounce;
                        self.timers.schedule(TimerKind::RenderDebounce, deadline, seq);
                    }
                }
            }
            MapEvent::Error(e) => warn!("Map error: {e}"),
        }
    }

    fn fetch_agencies(&mut self) {
        let call = self.service.agencies();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Event::AgenciesLoaded(call.await));
        });
    }

    fn on_agencies(&mut self, result: Result<Vec<Agency>, ServiceError>) {
        let list = match result {
            Ok(list) => list,
            Err(e) => {
                error!("Could not load agencies; recoloring stays disabled: {e}");
                return;
            }
        };

        self.agencies = agencies::agencies_for_city(&list, &self.config.city)
            .into_iter()
            .cloned()
            .collect();

        if self.store.options().agencies.is_none() {
            let enabled = agencies::default_enabled_agencies(&list);
            self.store.apply(OptionsAction::SetAgencies(enabled));
            self.issue_recolor();
        }
        if self.store.options().modes.is_none() {
            self.store.apply(OptionsAction::SetModes(agencies::all_modes()));
            self.issue_recolor();
        }
    }

    fn issue_recolor(&mut self) {
        let Some(issued) = self.recolor.issue(&self.store) else {
            debug!("Query options not loaded yet; not recoloring");
            return;
        };

        let now = Instant::now();
        if let Some(stuck_at) = self.monitor.begin(now) {
            // strictly after the threshold
            let deadline = stuck_at + Duration::from_millis(1);
            self.timers.schedule(TimerKind::Stuck, deadline, issued.seq);
        }
        self.timers.schedule(
            TimerKind::Safety,
            now + self.config.timings.safety_timeout,
            issued.seq,
        );
        // a busy-clear armed for an earlier paint must not close this cycle
        self.timers.cancel(TimerKind::RenderDebounce);
        self.timers.cancel(TimerKind::BusyFallback);

        info!(
            "Recolor #{} at options revision {} for ({}, {})",
            issued.seq,
            self.store.revision(),
            issued.origin.latitude,
            issued.origin.longitude
        );
        let call = self.service.calculate(issued.request);
        let tx = self.tx.clone();
        let (seq, origin, ramp) = (issued.seq, issued.origin, issued.ramp);
        tokio::spawn(async move {
            let result = call.await;
            let _ = tx.send(Event::RecolorSettled {
                seq,
                origin,
                ramp,
                result,
            });
        });
    }

    fn on_recolor_settled(
        &mut self,
        seq: u64,
        origin: LatLng,
        ramp: &ColorRamp,
        result: Result<CalculateResponse, ServiceError>,
    ) {
        match self.recolor.settle(seq, result, ramp) {
            RecolorOutcome::Stale => {}
            RecolorOutcome::Colored(coloring) => {
                self.store.record_last_good(origin);
                self.timers.cancel(TimerKind::Safety);
                self.hover.reset_for_new_result(&mut self.map);
                self.reconciler.accept(seq, coloring);
                self.apply_coloring(true);
            }
            RecolorOutcome::Failed(e) => {
                warn!("Recolor #{seq} failed: {e}");
                // keep the attempted origin so the UI does not look frozen
                self.store.record_last_good(origin);
                self.timers.cancel(TimerKind::Safety);
                self.clear_busy(ClearReason::RequestFailed);
            }
        }
    }

    fn apply_coloring(&mut self, retry_allowed: bool) {
        match self.reconciler.apply(&mut self.map, retry_allowed) {
            ApplyOutcome::Deferred => debug!("Map not loaded; paint deferred"),
            ApplyOutcome::Applied { seq } => {
                let deadline = Instant::now() + self.config.timings.busy_fallback;
                self.timers.schedule(TimerKind::BusyFallback, deadline, seq);
            }
            ApplyOutcome::RetryScheduled { seq, error } => {
                warn!("Paint failed, retrying once: {error}");
                self.clear_busy(ClearReason::ApplyError);
                let deadline = Instant::now() + self.config.timings.layer_retry_backoff;
                self.timers.schedule(TimerKind::LayerRetry, deadline, seq);
            }
            ApplyOutcome::Failed { seq, error } => {
                error!("Paint for recolor #{seq} failed: {error}");
                self.clear_busy(ClearReason::ApplyError);
            }
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        let Some(seq) = self.timers.take(fired) else {
            return;
        };
        let latest = seq == self.recolor.latest_seq();

        match fired.kind {
            TimerKind::Safety if latest => self.monitor.hide_indicator(),
            TimerKind::RenderDebounce if latest => self.clear_busy(ClearReason::Rendered),
            TimerKind::BusyFallback if latest => self.clear_busy(ClearReason::Fallback),
            TimerKind::LayerRetry => {
                if self.reconciler.current_seq() == Some(seq) {
                    info!("Retrying paint for recolor #{seq}");
                    self.apply_coloring(false);
                }
            }
            TimerKind::Stuck => {
                self.monitor.check_stuck(Instant::now());
            }
            _ => debug!("Ignoring {:?} for superseded recolor #{seq}", fired.kind),
        }
    }

    fn clear_busy(&mut self, reason: ClearReason) {
        self.monitor.resolve(reason);
        self.timers.cancel(TimerKind::Stuck);
        self.timers.cancel(TimerKind::RenderDebounce);
        self.timers.cancel(TimerKind::BusyFallback);
    }

    fn force_reset(&mut self) {
        info!("Force resetting loading state");
        self.clear_busy(ClearReason::ForceReset);
        let nudged = self.store.origin().nudged(self.config.reset_nudge_degrees);
        self.store.set_origin(nudged);
        self.issue_recolor();
    }

    fn teardown(&mut self) {
        self.timers.cancel_all();
        self.hover.cancel_current();
        self.monitor.resolve(ClearReason::Teardown);
        info!("Engine stopped");
    }

    fn publish(&self) {
        let state = ViewState {
            loading: self.monitor.state(),
            stuck: self.monitor.is_stuck(),
            origin: self.store.origin(),
            last_good_origin: self.store.last_good_origin(),
            coloring: self.reconciler.active().cloned(),
            hover: self.hover.phase(),
            detail: self.hover.detail().cloned(),
            alert: self.hover.alert().map(str::to_string),
            agencies: self.agencies.clone(),
            recolor_requests: self.recolor.issued(),
        };
        self.view.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Last stop for errors no controller knows how to handle.
fn report_unhandled(err: anyhow::Error) {
    error!("Unhandled error: {err:#}");
}
