use crate::error::{PqError, Result};

/// Number of centroids per subspace used when none is configured
pub const DEFAULT_CLUSTER_COUNT: usize = 256 ;

/// Shape of a product quantizer
///
/// A vector of `dimension` components is split into `dimension / subspace_width`
/// contiguous slices, each quantized against its own sub-codebook of
/// `cluster_count` centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PqConfig {
    pub dimension: usize ,
    pub subspace_width: usize ,
    pub cluster_count: usize
}

impl PqConfig {

    /// Creates a new [`PqConfig`] with [`DEFAULT_CLUSTER_COUNT`] centroids per subspace
    /// # Arguments
    /// * `dimension` - Dimensionality of the vectors to be indexed
    /// * `subspace_width` - Number of components in each subspace slice
    pub fn new(
        dimension: usize ,
        subspace_width: usize
    ) -> Self {
        PqConfig{ dimension , subspace_width , cluster_count: DEFAULT_CLUSTER_COUNT }
    }

    pub fn with_cluster_count(
        mut self ,
        cluster_count: usize
    ) -> Self {
        self.cluster_count = cluster_count ;
        self
    }

    /// Number of subspaces `M`
    pub fn subspace_count( &self ) -> usize {
        if self.subspace_width == 0 {
            return 0 ;
        }
        self.dimension / self.subspace_width
    }

    /// Checks that the dimension splits evenly into non-empty subspaces
    pub fn validate( &self ) -> Result<()> {
        if self.subspace_width == 0 {
            return Err( PqError::Configuration( "`subspace_width` must be greater than 0".to_string() ) ) ;
        }
        if self.dimension == 0 {
            return Err( PqError::Configuration( "`dimension` must be greater than 0".to_string() ) ) ;
        }
        if self.dimension % self.subspace_width != 0 {
            return Err( PqError::Configuration( format!(
                "dimension ({}) must be divisible by subspace_width ({})" ,
                self.dimension , self.subspace_width
            ) ) ) ;
        }
        if self.cluster_count == 0 {
            return Err( PqError::Configuration( "`cluster_count` must be greater than 0".to_string() ) ) ;
        }
        Ok( () )
    }
}
