//! Tunable constants for the search core.
//!
//! Grouped here the way the teacher groups deployment-wide constants in its
//! own `cnf` module, so the magic numbers called out in the specification
//! have a single, documented home instead of being scattered through the
//! pipeline.

/// Maximum number of terms a catalog word-lookup window may span
/// (`j - i <= WORD_WINDOW_MAX_LEN`, i.e. at most 19 additional terms after
/// the first one).
pub const WORD_WINDOW_MAX_LEN: usize = 20;

/// Maximum digit length for a pure-digit term to receive a synthetic
/// housenumber token.
pub const EXTRA_HOUSENUMBER_MAX_DIGITS: usize = 4;

/// Penalty assigned to a synthetic (catalog-absent) housenumber token.
pub const EXTRA_HOUSENUMBER_PENALTY: f64 = 0.5;

/// An assignment whose address ranges span more than this many term slots
/// is discarded outright (`spec.md` §4.5 step 2).
pub const MAX_ADDRESS_TOKENS: usize = 50;

/// Rows returned by a `PlaceSearch` candidate-name CTE are capped here
/// before the outer join and importance ordering take over.
pub const PLACE_SEARCH_CANDIDATE_CAP: usize = 10_000;

/// Statistical band applied to prune candidate rows when neither
/// housenumber, qualifier, nor free-form near is involved
/// (`penalty - importance < min + PLACE_SEARCH_PRUNE_BAND`). Kept
/// configurable per the open question in the design notes rather than
/// hard-coded at the call site.
pub const PLACE_SEARCH_PRUNE_BAND: f64 = 0.5;

/// Cap applied to the postcode-distance penalty in `PlaceSearch`.
pub const POSTCODE_DISTANCE_PENALTY_CAP: f64 = 2.0;

/// Penalty added for a synthetic street result when a housenumber was
/// requested but not found on the parent place.
pub const MISSING_HOUSENUMBER_PENALTY: f64 = 1.0;

/// Number of top inner-search results `NearSearch` considers as anchors.
pub const NEAR_SEARCH_ANCHOR_COUNT: usize = 5;

/// Accuracy slack applied when filtering inner-search results for
/// `NearSearch` anchors.
pub const NEAR_SEARCH_ACCURACY_SLACK: f64 = 0.5;

/// Maximum bounding-box area (in square degrees) for a result to be
/// eligible as a `NearSearch` anchor.
pub const NEAR_SEARCH_MAX_BBOX_AREA: f64 = 20.0;

/// Degrees of expansion used to find nearby category entries when a
/// class-type companion table exists.
pub const NEAR_SEARCH_EXPANSION_WITH_TABLE: f64 = 0.05;

/// Degrees of expansion used to find nearby category entries when no
/// class-type companion table exists.
pub const NEAR_SEARCH_EXPANSION_WITHOUT_TABLE: f64 = 0.01;

/// Magnitude of `QueryStruct::dir_penalty`, the global reading-direction
/// hint derived from the script the query is written in (`spec.md` §3:
/// "positive favors left-to-right reading, negative favors
/// right-to-left"). Kept as one small tie-break constant rather than a
/// proportional weight, matching the other fixed break-penalty constants.
pub const DIR_PENALTY_SCRIPT_HINT: f64 = 0.1;
