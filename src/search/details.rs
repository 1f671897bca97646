//! `SearchDetails`: the per-request options shared by every search run
//! by the executor (`spec.md` §6).

use super::SearchResult;

pub type LayerMask = u8;

pub const LAYER_ADDRESS: LayerMask = 1 << 0;
pub const LAYER_POI: LayerMask = 1 << 1;
pub const LAYER_MANMADE: LayerMask = 1 << 2;
pub const LAYER_RAILWAY: LayerMask = 1 << 3;
pub const LAYER_NATURAL: LayerMask = 1 << 4;
pub const ALL_LAYERS: LayerMask = LAYER_ADDRESS | LAYER_POI | LAYER_MANMADE | LAYER_RAILWAY | LAYER_NATURAL;

pub type GeometryOutput = u8;

pub const GEOMETRY_GEOJSON: GeometryOutput = 1 << 0;
pub const GEOMETRY_TEXT: GeometryOutput = 1 << 1;
pub const GEOMETRY_KML: GeometryOutput = 1 << 2;
pub const GEOMETRY_SVG: GeometryOutput = 1 << 3;

/// An axis-aligned `(min_lon, min_lat, max_lon, max_lat)` box.
pub type Viewbox = (f64, f64, f64, f64);

fn in_box((min_lon, min_lat, max_lon, max_lat): Viewbox, centroid: (f64, f64)) -> bool {
	centroid.0 >= min_lon && centroid.0 <= max_lon && centroid.1 >= min_lat && centroid.1 <= max_lat
}

#[derive(Debug, Clone)]
pub struct SearchDetails {
	pub max_results: usize,
	pub min_rank: i32,
	pub max_rank: i32,
	pub viewbox: Option<Viewbox>,
	/// A secondary, larger box (Nominatim's `viewboxlarge`) used only as a
	/// softer preference band when `viewbox` is a preference rather than a
	/// hard restriction (`spec.md` §4.7 "PostcodeSearch specifics").
	pub viewbox2: Option<Viewbox>,
	pub bounded_viewbox: bool,
	pub near: Option<(f64, f64)>,
	pub near_radius: Option<f64>,
	pub excluded: Vec<i64>,
	pub countries: Vec<String>,
	pub layers: LayerMask,
	pub geometry_output: GeometryOutput,
	pub geometry_simplification: f64,
}

impl Default for SearchDetails {
	fn default() -> Self {
		Self {
			max_results: 10,
			min_rank: 1,
			max_rank: 30,
			viewbox: None,
			viewbox2: None,
			bounded_viewbox: false,
			near: None,
			near_radius: None,
			excluded: Vec::new(),
			countries: Vec::new(),
			layers: ALL_LAYERS,
			geometry_output: 0,
			geometry_simplification: 0.0,
		}
	}
}

impl SearchDetails {
	/// Maps a catalog class to the layer bit it belongs to. A
	/// simplification of Nominatim's full class/type layer table
	/// (`spec.md` §6) — good enough to exercise the layer filter without
	/// importing the whole classification.
	fn class_layer(class: &str) -> LayerMask {
		match class {
			"railway" => LAYER_RAILWAY,
			"natural" => LAYER_NATURAL,
			"man_made" => LAYER_MANMADE,
			"place" | "building" | "boundary" => LAYER_ADDRESS,
			_ => LAYER_POI,
		}
	}

	fn in_viewbox(&self, centroid: (f64, f64)) -> bool {
		let Some(box_) = self.viewbox else {
			return true;
		};
		in_box(box_, centroid)
	}

	/// Containment-class penalty for a non-bounded (preference) viewbox:
	/// `0.0` inside `viewbox`, `0.5` inside `viewbox2` but outside
	/// `viewbox`, `1.0` outside both. `0.0` when no viewbox was supplied at
	/// all or the viewbox is a hard restriction (`bounded_viewbox`), since
	/// results outside it are excluded by [`Self::admits`] instead.
	pub fn viewbox_containment_penalty(&self, centroid: (f64, f64)) -> f64 {
		if self.bounded_viewbox {
			return 0.0;
		}
		match self.viewbox {
			None => 0.0,
			Some(box_) if in_box(box_, centroid) => 0.0,
			_ => match self.viewbox2 {
				Some(box2) if in_box(box2, centroid) => 0.5,
				_ => 1.0,
			},
		}
	}

	/// Whether `result` survives the hard filters (exclusion, country
	/// restriction, rank range, layer mask, bounded viewbox).
	pub fn admits(&self, result: &SearchResult) -> bool {
		if self.excluded.contains(&result.place_id) {
			return false;
		}
		if result.rank_address != 0 && (result.rank_address < self.min_rank || result.rank_address > self.max_rank) {
			return false;
		}
		if !self.countries.is_empty() {
			let matches_country = result.country_code.as_deref().map(|c| self.countries.iter().any(|cc| cc.eq_ignore_ascii_case(c))).unwrap_or(false);
			if !matches_country {
				return false;
			}
		}
		if Self::class_layer(&result.class) & self.layers == 0 {
			return false;
		}
		if self.bounded_viewbox && !self.in_viewbox(result.centroid) {
			return false;
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(place_id: i64, class: &str, rank_address: i32) -> SearchResult {
		SearchResult {
			place_id,
			osm_type: "N".into(),
			osm_id: place_id,
			class: class.into(),
			type_: "x".into(),
			rank_address,
			rank_search: rank_address,
			accuracy: 0.0,
			housenumber: None,
			postcode: None,
			country_code: Some("de".into()),
			centroid: (0.0, 0.0),
			bbox_area: 0.0,
			geometry_wkb: vec![],
		}
	}

	#[test]
	fn excluded_ids_are_rejected() {
		let mut details = SearchDetails::default();
		details.excluded.push(5);
		assert!(!details.admits(&result(5, "place", 16)));
		assert!(details.admits(&result(6, "place", 16)));
	}

	#[test]
	fn rank_range_is_enforced() {
		let mut details = SearchDetails::default();
		details.min_rank = 10;
		details.max_rank = 20;
		assert!(!details.admits(&result(1, "place", 5)));
		assert!(details.admits(&result(1, "place", 15)));
	}

	#[test]
	fn layer_mask_filters_by_class() {
		let mut details = SearchDetails::default();
		details.layers = LAYER_RAILWAY;
		assert!(!details.admits(&result(1, "place", 16)));
		assert!(details.admits(&result(1, "railway", 16)));
	}

	#[test]
	fn viewbox_containment_penalty_has_three_tiers() {
		let mut details = SearchDetails::default();
		details.viewbox = Some((0.0, 0.0, 1.0, 1.0));
		details.viewbox2 = Some((-10.0, -10.0, 10.0, 10.0));
		assert_eq!(details.viewbox_containment_penalty((0.5, 0.5)), 0.0);
		assert_eq!(details.viewbox_containment_penalty((5.0, 5.0)), 0.5);
		assert_eq!(details.viewbox_containment_penalty((50.0, 50.0)), 1.0);
	}

	#[test]
	fn viewbox_containment_penalty_is_zero_when_bounded_or_unset() {
		let details = SearchDetails::default();
		assert_eq!(details.viewbox_containment_penalty((50.0, 50.0)), 0.0);

		let mut bounded = SearchDetails::default();
		bounded.viewbox = Some((0.0, 0.0, 1.0, 1.0));
		bounded.bounded_viewbox = true;
		assert_eq!(bounded.viewbox_containment_penalty((50.0, 50.0)), 0.0);
	}
}
