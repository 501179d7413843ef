use anyhow::{bail, Context};
use std::sync::Arc;
use std::time::Duration;
use timetoreach_map::coloring::ColorRamp;
use timetoreach_map::engine::{Engine, EngineHandle, Input, ViewState};
use timetoreach_map::gestures::{InputModality, PointerSample, RawGesture};
use timetoreach_map::headless_map::{HeadlessMap, Viewport};
use timetoreach_map::hover::HoverPhase;
use timetoreach_map::map_layer::MapEvent;
use timetoreach_map::time::DurationFormatter;
use timetoreach_map::web::HttpService;
use timetoreach_map::{Configuration, LatLng};

const USAGE: &str = "usage: timetoreach-map <lat> <lng> [--edges edges.geojson] [--hover <lat> <lng>]";
const WAIT_LIMIT: Duration = Duration::from_secs(60);
// a click that misses every edge never leaves Idle
const HIT_WAIT: Duration = Duration::from_secs(1);

struct Args {
    origin: LatLng,
    edges: Option<String>,
    hover: Option<LatLng>,
}

fn parse_lat_lng(lat: Option<String>, lng: Option<String>) -> anyhow::Result<LatLng> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        bail!(USAGE);
    };
    Ok(LatLng::from_lat_lng(
        lat.parse().with_context(|| format!("bad latitude {lat}"))?,
        lng.parse().with_context(|| format!("bad longitude {lng}"))?,
    ))
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let origin = parse_lat_lng(args.next(), args.next())?;
    let mut edges = None;
    let mut hover = None;
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--edges" => edges = Some(args.next().context(USAGE)?),
            "--hover" => hover = Some(parse_lat_lng(args.next(), args.next())?),
            other => bail!("unknown argument {other}\n{USAGE}"),
        }
    }
    Ok(Args {
        origin,
        edges,
        hover,
    })
}

fn load_edges(path: &str) -> anyhow::Result<geojson::FeatureCollection> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let geojson: geojson::GeoJson = text.parse().with_context(|| format!("parsing {path}"))?;
    Ok(geojson::FeatureCollection::try_from(geojson)?)
}

async fn wait_for(
    handle: &EngineHandle,
    what: &str,
    limit: Duration,
    done: impl FnMut(&ViewState) -> bool,
) -> anyhow::Result<ViewState> {
    let mut view = handle.subscribe();
    let state = tokio::time::timeout(limit, view.wait_for(done))
        .await
        .with_context(|| format!("timed out waiting for {what}"))?
        .context("engine stopped")?
        .clone();
    Ok(state)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Configuration::from_env();
    let viewport = Viewport {
        center: args.origin,
        zoom: 12.0,
        width: 1024.0,
        height: 768.0,
    };
    let mut map = HeadlessMap::new(viewport, config.tile_url());
    if let Some(path) = &args.edges {
        map = map.with_edges(&load_edges(path)?);
    }
    let service = Arc::new(HttpService::new(&config));
    let max_duration = config.options.max_duration_secs;

    let (engine, handle) = Engine::new(config, service, map, InputModality::Mouse);
    let engine = tokio::spawn(engine.run());

    handle.send(Input::Map(MapEvent::Loaded))?;
    handle.send(Input::SetOrigin(args.origin))?;

    let state = wait_for(&handle, "edge times", WAIT_LIMIT, ViewState::recolor_settled).await?;
    let Some(coloring) = &state.coloring else {
        if state.stuck {
            bail!("loading is stuck; the server did not answer");
        }
        bail!("the reachability service did not return edge times");
    };
    handle.send(Input::Map(MapEvent::Render))?;

    let reachable = coloring.raw.values().filter(|&&s| u64::from(s) <= max_duration).count();
    println!(
        "{} edges reachable within {} from ({}, {})",
        reachable,
        DurationFormatter(max_duration as f64),
        state.last_good_origin.latitude,
        state.last_good_origin.longitude
    );
    for (secs, color) in ColorRamp::new(max_duration).legend(4) {
        println!("  {:>10}  {color}", DurationFormatter(secs as f64).to_string());
    }

    if let Some(target) = args.hover {
        let point = viewport.project(target);
        handle.send(Input::Gesture(RawGesture::Click(PointerSample {
            point,
            lat_lng: target,
            alt_key: false,
        })))?;
        let started =
            wait_for(&handle, "hit test", HIT_WAIT, |s| s.hover != HoverPhase::Idle).await;
        let state = match started {
            Ok(_) => {
                wait_for(&handle, "trip details", WAIT_LIMIT, |s| {
                    s.hover != HoverPhase::Pending
                })
                .await?
            }
            Err(_) => handle.view(),
        };
        match (&state.detail, &state.alert) {
            (Some(detail), _) => println!("{detail}"),
            (None, Some(alert)) => println!("{alert}"),
            (None, None) => println!(
                "No trip found near ({}, {})",
                target.latitude, target.longitude
            ),
        }
    }

    handle.send(Input::Shutdown)?;
    engine.await?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}
