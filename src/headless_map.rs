//! An in-memory [`MapLayer`] for running the engine without a browser. Edge
//! geometry is projected to Web-Mercator pixels once and indexed in an R-tree
//! for hit-testing.

use crate::coloring::{EdgeId, PaintExpression};
use crate::map_layer::{
    Cursor, MapError, MapLayer, RenderedFeature, ScreenPoint, TRANSIT_LAYER_ID,
};
use crate::store::LatLng;
use geojson::feature::Id;
use rstar::primitives::{GeomWithData, Line};
use rstar::{PointDistance, RTree};
use rustc_hash::FxHashSet;
use std::f64::consts::PI;

const TILE_SIZE: f64 = 512.0;

type EdgeSegment = GeomWithData<Line<[f64; 2]>, Option<EdgeId>>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    fn to_world(&self, p: LatLng) -> [f64; 2] {
        let size = self.world_size();
        let x = (p.longitude + 180.0) / 360.0 * size;
        let lat = p.latitude.to_radians();
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
        [x, y]
    }

    fn origin(&self) -> [f64; 2] {
        let c = self.to_world(self.center);
        [c[0] - self.width / 2.0, c[1] - self.height / 2.0]
    }

    pub fn project(&self, p: LatLng) -> ScreenPoint {
        let w = self.to_world(p);
        let o = self.origin();
        ScreenPoint::new(w[0] - o[0], w[1] - o[1])
    }

    #[cfg(test)]
    pub fn unproject(&self, s: ScreenPoint) -> LatLng {
        let o = self.origin();
        let size = self.world_size();
        let x = (s.x + o[0]) / size;
        let y = (s.y + o[1]) / size;
        let lng = x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
        LatLng::from_lat_lng(lat, lng)
    }
}

fn edge_id(id: &Option<Id>) -> Option<EdgeId> {
    match id {
        Some(Id::Number(n)) => n.as_u64().map(EdgeId),
        Some(Id::String(s)) => s.parse().ok().map(EdgeId),
        None => None,
    }
}

pub struct HeadlessMap {
    viewport: Viewport,
    tile_url: String,
    edges: RTree<EdgeSegment>,
    transit_layer: bool,
    path_layer: bool,
    colors: Option<PaintExpression>,
    path: Option<geojson::GeoJson>,
    cursor: Cursor,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport, tile_url: String) -> Self {
        HeadlessMap {
            viewport,
            tile_url,
            edges: RTree::new(),
            transit_layer: false,
            path_layer: false,
            colors: None,
            path: None,
            cursor: Cursor::Default,
        }
    }

    /// Loads `LineString` / `MultiLineString` features; their ids become edge ids.
    pub fn with_edges(mut self, edges: &geojson::FeatureCollection) -> Self {
        let mut segments = Vec::new();
        for feature in &edges.features {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let id = edge_id(&feature.id);
            let lines: Vec<geo_types::LineString<f64>> =
                match geo_types::Geometry::<f64>::try_from(geometry.clone()) {
                    Ok(geo_types::Geometry::LineString(ls)) => vec![ls],
                    Ok(geo_types::Geometry::MultiLineString(mls)) => mls.0,
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("Skipping edge {id:?}: {e}");
                        continue;
                    }
                };
            for line in lines.iter().flat_map(|ls| ls.lines()) {
                let a = self
                    .viewport
                    .to_world(LatLng::from_lat_lng(line.start.y, line.start.x));
                let b = self
                    .viewport
                    .to_world(LatLng::from_lat_lng(line.end.y, line.end.x));
                segments.push(GeomWithData::new(Line::new(a, b), id));
            }
        }
        log::info!("Indexed {} edge segments", segments.len());
        self.edges = RTree::bulk_load(segments);
        self
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn edge_color(&self, edge: EdgeId) -> Option<&str> {
        self.colors.as_ref().map(|paint| paint.color_of(edge))
    }

    pub fn path(&self) -> Option<&geojson::GeoJson> {
        self.path.as_ref()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }
}

impl MapLayer for HeadlessMap {
    fn add_transit_layer(&mut self) -> Result<(), MapError> {
        log::debug!("Adding {TRANSIT_LAYER_ID} from {}", self.tile_url);
        self.transit_layer = true;
        Ok(())
    }

    fn add_path_layer(&mut self) -> Result<(), MapError> {
        self.path_layer = true;
        Ok(())
    }

    fn set_edge_colors(&mut self, paint: &PaintExpression) -> Result<(), MapError> {
        if !self.transit_layer {
            return Err(MapError::LayerNotReady(TRANSIT_LAYER_ID.to_string()));
        }
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("line-color: {}", paint.to_style_json());
        }
        self.colors = Some(paint.clone());
        Ok(())
    }

    fn set_path_data(&mut self, path: Option<&geojson::GeoJson>) {
        if !self.path_layer {
            return;
        }
        self.path = path.cloned();
    }

    fn query_rendered_features(&self, point: ScreenPoint, radius_px: f64) -> Vec<RenderedFeature> {
        if !self.transit_layer {
            return vec![];
        }
        let o = self.viewport.origin();
        let query = [point.x + o[0], point.y + o[1]];

        let mut hits: Vec<(f64, Option<EdgeId>)> = self
            .edges
            .locate_within_distance(query, radius_px * radius_px)
            .map(|seg| (seg.distance_2(&query), seg.data))
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut seen = FxHashSet::default();
        hits.retain(|(_, id)| seen.insert(*id));

        hits.into_iter()
            .map(|(_, id)| RenderedFeature { id })
            .collect()
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }
}
