//! Product quantization with asymmetric distance computation.
//!
//! Corpus vectors are split into equal-width subspaces and each slice is
//! replaced by the index of its nearest centroid in that subspace's codebook.
//! A query stays at full precision: its squared distance to every centroid is
//! computed once into a [`DistanceTable`], after which the distance to any
//! encoded vector is a sum of table lookups. [`select_top_k`] scans the encoded
//! corpus with a bounded max-heap and abandons a vector as soon as its partial
//! sum exceeds the current K-th best distance. [`VpTree`] answers exact
//! nearest and radius queries over the raw vectors.
//!
//! ```no_run
//! use asymmetric_pq::{PqConfig, PqIndex};
//!
//! let config = PqConfig::new( 144 , 8 ) ;
//! let index: PqIndex = PqIndex::build( config , "image_feature.144" , "cluster" )? ;
//! let nearest = index.search( &vec![ 0.0 ; 144 ] , 30 )?.ascending_ids() ;
//! # Ok::<(), asymmetric_pq::PqError>(())
//! ```

pub mod codebook;
pub mod config;
pub mod error;
pub mod features;
pub mod index;
pub mod pq;
pub mod topk;
pub mod vptree;

pub use codebook::Codebook;
pub use config::{PqConfig, DEFAULT_CLUSTER_COUNT};
pub use error::{PqError, Result};
pub use features::{read_features, read_features_from_path};
pub use index::PqIndex;
pub use pq::{CorpusIndex, DistanceTable, ProductQuantizer};
pub use topk::{select_top_k, select_within, Neighbor, Selection, SelectionStats};
pub use vptree::VpTree;
