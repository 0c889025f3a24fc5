pub mod geojson;
pub mod query;

pub use geojson::{encode_feature_collection, FeatureCollection};
pub use query::{resolve_snapshot, QueryError, ResolvedSnapshot};
