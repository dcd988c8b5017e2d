use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use num_traits::ToPrimitive;
use num_traits::sign::Unsigned;
use num_traits::cast::FromPrimitive;
use tracing::{debug, info, warn};

use crate::codebook::Codebook;
use crate::config::PqConfig;
use crate::error::{PqError, Result};
use crate::features::{read_features, read_features_from_path};
use crate::pq::{CorpusIndex, ProductQuantizer};
use crate::topk::{select_top_k, select_within, Neighbor, Selection};

/// Read-only product quantization index
///
/// Built once from a corpus and a codebook, then queried any number of times.
/// Queries only borrow the index, so one index can serve many threads at once.
/// `T` is the integer type each code is stored as.
#[derive(Debug, Clone)]
pub struct PqIndex<T = u16> {
    config: PqConfig ,
    quantizer: ProductQuantizer ,
    corpus: CorpusIndex<T>
}

impl<T> PqIndex<T> where T: Unsigned + FromPrimitive + ToPrimitive + Send {

    /// Builds an index from a feature file and a directory of centroid files
    /// # Arguments
    /// * `config` - Shape of the quantizer
    /// * `feature_path` - File with one vector per line
    /// * `centroid_prefix` - Directory holding `cluster.1` .. `cluster.M`
    pub fn build(
        config: PqConfig ,
        feature_path: impl AsRef<Path> ,
        centroid_prefix: impl AsRef<Path>
    ) -> Result<Self> {
        config.validate()? ;
        let features = read_features_from_path( feature_path , config.dimension )? ;
        info!( vectors = features.len() , "load features finished" ) ;
        let codebook = Codebook::load_from_prefix( centroid_prefix , config.subspace_count() )? ;
        info!( subspaces = codebook.subspace_count() , "load centroids finished" ) ;
        PqIndex::from_vectors( config , codebook , &features )
    }

    /// Builds an index from already opened sources
    /// # Arguments
    /// * `config` - Shape of the quantizer
    /// * `features` - Reader with one vector per line
    /// * `centroid_sources` - One centroid reader per subspace, in subspace order
    pub fn from_readers<F, I, R>(
        config: PqConfig ,
        features: F ,
        centroid_sources: I
    ) -> Result<Self> where F: BufRead , I: IntoIterator<Item = R> , R: BufRead {
        config.validate()? ;
        let features = read_features( features , "features" , config.dimension )? ;
        info!( vectors = features.len() , "load features finished" ) ;
        let codebook = Codebook::load( centroid_sources , config.subspace_count() )? ;
        info!( subspaces = codebook.subspace_count() , "load centroids finished" ) ;
        PqIndex::from_vectors( config , codebook , &features )
    }

    /// Builds an index by encoding `vectors` against `codebook`
    /// # Errors
    /// [`PqError::Dimension`] if the codebook's shape does not match `config` or a
    /// vector has the wrong length
    pub fn from_vectors<V>(
        config: PqConfig ,
        codebook: Codebook ,
        vectors: &[V]
    ) -> Result<Self> where V: AsRef<[f32]> + Sync {
        config.validate()? ;
        if codebook.subspace_count() != config.subspace_count() {
            return Err( PqError::Dimension {
                context: "codebook" , index: 0 , expected: config.subspace_count() , actual: codebook.subspace_count()
            } ) ;
        }
        if codebook.subspace_width() != config.subspace_width {
            return Err( PqError::Dimension {
                context: "centroid" , index: 0 , expected: config.subspace_width , actual: codebook.subspace_width()
            } ) ;
        }
        for m in 0..codebook.subspace_count() {
            if codebook.cluster_count( m ) != config.cluster_count {
                warn!(
                    subspace = m , expected = config.cluster_count , actual = codebook.cluster_count( m ) ,
                    "sub-codebook size differs from configured cluster count"
                ) ;
            }
        }

        let quantizer = ProductQuantizer::new( Arc::new( codebook ) ) ;
        let corpus = quantizer.encode( vectors )? ;
        info!( vectors = corpus.len() , "hash table built" ) ;
        Ok( PqIndex{ config , quantizer , corpus } )
    }

    /// Identifiers of the `top_k` nearest vectors to `query`, in the order they
    /// leave the selection heap (farthest of the retained first). See
    /// [`PqIndex::search`] for distances and nearest-first order
    pub fn query(
        &self ,
        query: &[f32] ,
        top_k: usize
    ) -> Result<Vec<usize>> {
        Ok( self.search( query , top_k )?.drain_order_ids() )
    }

    /// Runs a full top-k search for `query`
    /// # Errors
    /// [`PqError::Dimension`] if `query` has the wrong length,
    /// [`PqError::Configuration`] if `top_k` is 0
    pub fn search(
        &self ,
        query: &[f32] ,
        top_k: usize
    ) -> Result<Selection> {
        if top_k == 0 {
            return Err( PqError::Configuration( "top-k must be at least 1".to_string() ) ) ;
        }
        let table = self.quantizer.dtable( query )? ;
        let selection = select_top_k( &self.corpus , &table , top_k )? ;
        debug!( top_k , found = selection.len() , "query finished" ) ;
        Ok( selection )
    }

    /// Every indexed vector whose asymmetric distance to `query` is below `radius`,
    /// nearest first. Distances are squared, so `radius` is a squared distance too
    /// # Errors
    /// [`PqError::Dimension`] if `query` has the wrong length,
    /// [`PqError::Configuration`] if `radius` is NaN
    pub fn within(
        &self ,
        query: &[f32] ,
        radius: f32
    ) -> Result<Vec<Neighbor>> {
        let table = self.quantizer.dtable( query )? ;
        select_within( &self.corpus , &table , radius )
    }

    pub fn config( &self ) -> &PqConfig {
        &self.config
    }

    pub fn codebook( &self ) -> &Codebook {
        self.quantizer.codebook()
    }

    pub fn corpus( &self ) -> &CorpusIndex<T> {
        &self.corpus
    }

    /// Number of indexed vectors
    pub fn len( &self ) -> usize {
        self.corpus.len()
    }

    pub fn is_empty( &self ) -> bool {
        self.corpus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn example_index() -> PqIndex {
        let codebook = Codebook::from_centroids( vec![
            vec![ vec![ 0.0 , 0.0 ] , vec![ 10.0 , 10.0 ] ] ,
            vec![ vec![ 0.0 , 0.0 ] , vec![ 10.0 , 10.0 ] ]
        ] ).unwrap() ;
        let config = PqConfig::new( 4 , 2 ).with_cluster_count( 2 ) ;
        PqIndex::from_vectors( config , codebook , &[ vec![ 1.0 , 1.0 , 1.0 , 1.0 ] ] ).unwrap()
    }

    #[test]
    fn single_vector_corpus_answers_query() {
        let index = example_index() ;
        assert_eq!( index.corpus().get( 0 ) , Some( &[ 0u16 , 0 ][..] ) ) ;
        let selection = index.search( &[ 9.0 , 9.0 , 9.0 , 9.0 ] , 1 ).unwrap() ;
        let nearest = selection.ascending() ;
        assert_eq!( nearest.len() , 1 ) ;
        assert_eq!( nearest[ 0 ].id , 0 ) ;
        assert!( ( nearest[ 0 ].distance - 324.0 ).abs() < 1e-3 ) ;
        assert_eq!( index.query( &[ 9.0 , 9.0 , 9.0 , 9.0 ] , 1 ).unwrap() , vec![ 0 ] ) ;
    }

    #[test]
    fn query_rejects_zero_top_k() {
        let index = example_index() ;
        assert!( matches!( index.query( &[ 0.0 ; 4 ] , 0 ) , Err( PqError::Configuration( _ ) ) ) ) ;
    }

    #[test]
    fn query_rejects_wrong_dimension() {
        let index = example_index() ;
        assert!( matches!( index.query( &[ 0.0 ; 5 ] , 1 ) , Err( PqError::Dimension { .. } ) ) ) ;
    }

    #[test]
    fn codebook_width_must_match_config() {
        let codebook = Codebook::from_centroids( vec![
            vec![ vec![ 0.0 , 0.0 , 0.0 ] ] ,
            vec![ vec![ 0.0 , 0.0 , 0.0 ] ]
        ] ).unwrap() ;
        let config = PqConfig::new( 4 , 2 ) ;
        let err = PqIndex::<u16>::from_vectors( config , codebook , &[ vec![ 0.0 ; 4 ] ] ).unwrap_err() ;
        match err {
            PqError::Dimension { context , expected , actual , .. } => {
                assert_eq!( context , "centroid" ) ;
                assert_eq!( ( expected , actual ) , ( 2 , 3 ) ) ;
            }
            other => panic!( "unexpected error {:?}" , other )
        }
    }

    #[test]
    fn from_readers_builds_index() {
        let features = Cursor::new( "1 1 1 1\n9 9 9 9\n0 0 10 10\n" ) ;
        let centroids = vec![ Cursor::new( "0 0 0\n1 10 10\n" ) , Cursor::new( "0 0 0\n1 10 10\n" ) ] ;
        let config = PqConfig::new( 4 , 2 ).with_cluster_count( 2 ) ;
        let index: PqIndex<u8> = PqIndex::from_readers( config , features , centroids ).unwrap() ;
        assert_eq!( index.len() , 3 ) ;
        assert_eq!( index.corpus().get( 2 ) , Some( &[ 0u8 , 1 ][..] ) ) ;
        let selection = index.search( &[ 10.0 , 10.0 , 10.0 , 10.0 ] , 2 ).unwrap() ;
        assert_eq!( selection.ascending_ids() , vec![ 1 , 2 ] ) ;
        assert_eq!( index.query( &[ 10.0 , 10.0 , 10.0 , 10.0 ] , 2 ).unwrap() , vec![ 2 , 1 ] ) ;
    }

    #[test]
    fn within_uses_asymmetric_distance() {
        let features = Cursor::new( "1 1 1 1\n9 9 9 9\n0 0 10 10\n" ) ;
        let centroids = vec![ Cursor::new( "0 0 0\n1 10 10\n" ) , Cursor::new( "0 0 0\n1 10 10\n" ) ] ;
        let config = PqConfig::new( 4 , 2 ).with_cluster_count( 2 ) ;
        let index: PqIndex<u8> = PqIndex::from_readers( config , features , centroids ).unwrap() ;
        let found = index.within( &[ 10.0 , 10.0 , 10.0 , 10.0 ] , 250.0 ).unwrap() ;
        let ids: Vec<usize> = found.iter().map( | neighbor | neighbor.id ).collect() ;
        assert_eq!( ids , vec![ 1 , 2 ] ) ;
        assert_eq!( found[ 1 ].distance , 200.0 ) ;
        assert!( matches!( index.within( &[ 0.0 ; 3 ] , 1.0 ) , Err( PqError::Dimension { .. } ) ) ) ;
    }

    #[test]
    fn uneven_config_fails_before_reading() {
        let config = PqConfig::new( 5 , 2 ) ;
        let result = PqIndex::<u16>::from_readers( config , Cursor::new( "" ) , Vec::<Cursor<&str>>::new() ) ;
        assert!( matches!( result , Err( PqError::Configuration( _ ) ) ) ) ;
    }
}
