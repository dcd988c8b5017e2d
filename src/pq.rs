use std::sync::Arc;

use num_traits::ToPrimitive;
use num_traits::sign::Unsigned;
use num_traits::cast::FromPrimitive;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::codebook::Codebook;
use crate::error::{PqError, Result};

/// Encoded corpus: one code sequence per vector, where the position of the
/// code sequence is the identifier of the vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusIndex<T> {
    codes: Vec<Vec<T>>
}

impl<T> CorpusIndex<T> {

    pub fn len( &self ) -> usize {
        self.codes.len()
    }

    pub fn is_empty( &self ) -> bool {
        self.codes.is_empty()
    }

    /// Code sequence of the vector with identifier `id`
    pub fn get(
        &self ,
        id: usize
    ) -> Option<&[T]> {
        self.codes.get( id ).map( | code | code.as_slice() )
    }

    pub fn iter( &self ) -> impl Iterator<Item = &[T]> {
        self.codes.iter().map( | code | code.as_slice() )
    }
}

/// Squared distances from one query to every centroid of every subspace.
/// `distances[m][c]` is the distance between the query's `m`th slice and centroid `c`
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable {
    distances: Vec<Vec<f32>>
}

impl DistanceTable {

    pub fn subspace_count( &self ) -> usize {
        self.distances.len()
    }

    pub fn get(
        &self ,
        m: usize ,
        c: usize
    ) -> Option<f32> {
        self.distances.get( m )?.get( c ).copied()
    }

    /// Distances to all centroids of subspace `m`
    pub fn row(
        &self ,
        m: usize
    ) -> Option<&[f32]> {
        self.distances.get( m ).map( | row | row.as_slice() )
    }
}

/// Quantizes vectors against a fixed [`Codebook`] and builds the per-query
/// distance tables used for asymmetric search
#[derive(Debug, Clone)]
pub struct ProductQuantizer {
    codebook: Arc<Codebook>
}

impl ProductQuantizer {

    /// Creates a new [`ProductQuantizer`] instance
    /// # Arguments
    /// * `codebook` - Centroids of every subspace, shared read-only
    pub fn new(
        codebook: Arc<Codebook>
    ) -> Self {
        ProductQuantizer{ codebook }
    }

    pub fn codebook( &self ) -> &Codebook {
        &self.codebook
    }

    /// Dimensionality of vectors accepted by `encode` and `dtable`
    pub fn dimension( &self ) -> usize {
        self.codebook.dimension()
    }

    /// Given `vectors`, return their quantized versions. Each quantized vector has one
    /// component per subspace, of data-type `T`
    /// # Arguments
    /// * `vectors` - Vectors to be quantized
    /// # Returns
    /// The encoded corpus, in the same order as `vectors`
    /// # Errors
    /// [`PqError::Dimension`] if any vector has the wrong length, in which case nothing
    /// is encoded. [`PqError::Configuration`] if a centroid index cannot be represented by `T`
    pub fn encode<T, V>(
        &self ,
        vectors: &[V]
    ) -> Result<CorpusIndex<T>> where T: Unsigned + FromPrimitive + Send , V: AsRef<[f32]> + Sync {
        let dimension = self.dimension() ;
        for ( i , vec ) in vectors.iter().enumerate() {
            let actual = vec.as_ref().len() ;
            if actual != dimension {
                return Err( PqError::Dimension { context: "vector" , index: i , expected: dimension , actual } ) ;
            }
        }
        let max_cluster_count = self.codebook.max_cluster_count() ;
        if max_cluster_count > 0 && T::from_usize( max_cluster_count - 1 ).is_none() {
            return Err( PqError::Configuration( format!(
                "{} centroids per subspace do not fit in a {}-byte code" ,
                max_cluster_count , std::mem::size_of::<T>()
            ) ) ) ;
        }

        #[cfg(feature = "parallel")]
        let codes = vectors.par_iter()
            .map( | vec | self.vector_quantize( vec.as_ref() ) )
            .collect::<Result<Vec<Vec<T>>>>()? ;
        #[cfg(not(feature = "parallel"))]
        let codes = vectors.iter()
            .map( | vec | self.vector_quantize( vec.as_ref() ) )
            .collect::<Result<Vec<Vec<T>>>>()? ;

        debug!( vectors = codes.len() , subspaces = self.codebook.subspace_count() , "encoded vectors" ) ;
        Ok( CorpusIndex{ codes } )
    }

    /// Builds the asymmetric distance table for `query`. The query is used at full
    /// precision, only the corpus is quantized
    /// # Arguments
    /// * `query` - Vector whose nearest encoded vectors are searched
    /// # Errors
    /// [`PqError::Dimension`] if `query` has the wrong length
    pub fn dtable(
        &self ,
        query: &[f32]
    ) -> Result<DistanceTable> {
        let dimension = self.dimension() ;
        if query.len() != dimension {
            return Err( PqError::Dimension { context: "query" , index: 0 , expected: dimension , actual: query.len() } ) ;
        }
        let sub_vec_dims = self.codebook.subspace_width() ;
        let mut distances: Vec<Vec<f32>> = Vec::with_capacity( self.codebook.subspace_count() ) ;
        for ( m , centroids ) in self.codebook.sub_codebooks().iter().enumerate() {
            let query_sub = &query[ (m * sub_vec_dims)..((m+1) * sub_vec_dims) ] ;
            let m_sub_distances: Vec<f32> = centroids
                .iter()
                .map( | centroid | ProductQuantizer::squared_euclid_distance( query_sub , centroid ) )
                .collect() ;
            distances.push( m_sub_distances ) ;
        }
        Ok( DistanceTable{ distances } )
    }

    /// Given a vector of the right length, return the index of the nearest
    /// centroid in each subspace. On equal distances the lower index is kept
    fn vector_quantize<T>(
        &self ,
        vector: &[f32]
    ) -> Result<Vec<T>> where T: Unsigned + FromPrimitive {
        let sub_vec_dims = self.codebook.subspace_width() ;
        let mut codes: Vec<T> = Vec::with_capacity( self.codebook.subspace_count() ) ;
        for ( m , centroids ) in self.codebook.sub_codebooks().iter().enumerate() {
            let subvector = &vector[ (m * sub_vec_dims)..((m+1) * sub_vec_dims) ] ;
            let mut min_distance: Option<f32> = None ;
            let mut min_distance_code_index: usize = 0 ;
            for ( k , centroid ) in centroids.iter().enumerate() {
                let distance = ProductQuantizer::squared_euclid_distance( subvector , centroid ) ;
                if min_distance.map_or( true , | min | distance < min ) {
                    min_distance = Some( distance ) ;
                    min_distance_code_index = k ;
                }
            }
            let code = T::from_usize( min_distance_code_index ).ok_or_else( || PqError::Configuration( format!(
                "centroid index {} does not fit the code type" , min_distance_code_index
            ) ) )? ;
            codes.push( code ) ;
        }
        Ok( codes )
    }

    /// Squared Euclidean distance between `vec1` and `vec2`, used both to encode
    /// vectors and to fill distance tables
    pub fn squared_euclid_distance(
        vec1: &[f32] ,
        vec2: &[f32]
    ) -> f32 {
        let mut squared_diff_sum = 0.0 ;
        for ( a , b ) in vec1.iter().zip( vec2 ) {
            squared_diff_sum += ( a - b ) * ( a - b ) ;
        }
        squared_diff_sum
    }

}

/// Converts a stored code back into a centroid index
pub(crate) fn code_index<T: ToPrimitive>( code: &T ) -> Option<usize> {
    code.to_usize()
}
