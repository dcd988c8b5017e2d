//! Vantage-point tree for exact nearest-neighbor search on raw vectors.
//!
//! Each node picks a vantage point and splits the remaining points at the
//! median distance `mu` from it: points closer than `mu` go left, the rest go
//! right. A search keeps a radius `tau` (the current k-th best distance, or the
//! caller's radius) and, by the triangle inequality, skips the left subtree when
//! `d > mu + tau` and the right one when `d < mu - tau`, where `d` is the
//! distance from the query to the vantage point. Distances are true Euclidean
//! distances, since squared distances do not satisfy the triangle inequality.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{PqError, Result};
use crate::pq::ProductQuantizer;
use crate::topk::{BoundedMaxHeap, HeapEntry, Neighbor};

/// Seed used by [`VpTree::new`] to choose vantage points
pub const DEFAULT_VANTAGE_SEED: u64 = 0x5eed ;

#[derive(Debug, Clone)]
struct VpNode {
    /// Identifier of the vantage point
    vp: usize ,
    mu: f32 ,
    left: Option<usize> ,
    right: Option<usize>
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left ,
    Right
}

/// A subtree waiting to be visited, with the split it hangs off so the pruning
/// test can be made against the radius current when it is popped
#[derive(Debug, Clone, Copy)]
struct Pending {
    node: usize ,
    split: Option<( Side , f32 , f32 )>
}

/// Vantage-point tree over a fixed set of vectors. Identifiers are positions in
/// the input
#[derive(Debug, Clone)]
pub struct VpTree {
    points: Vec<Vec<f32>> ,
    nodes: Vec<VpNode> ,
    root: Option<usize> ,
    dimension: usize
}

impl VpTree {

    /// Builds a tree over `points`, choosing vantage points with [`DEFAULT_VANTAGE_SEED`]
    /// # Errors
    /// [`PqError::Dimension`] if the points do not all have the same length
    pub fn new(
        points: Vec<Vec<f32>>
    ) -> Result<Self> {
        VpTree::with_seed( points , DEFAULT_VANTAGE_SEED )
    }

    /// Builds a tree over `points`, choosing vantage points at random from `seed`
    pub fn with_seed(
        points: Vec<Vec<f32>> ,
        seed: u64
    ) -> Result<Self> {
        let dimension = points.first().map_or( 0 , | point | point.len() ) ;
        for ( i , point ) in points.iter().enumerate() {
            if point.len() != dimension {
                return Err( PqError::Dimension { context: "point" , index: i , expected: dimension , actual: point.len() } ) ;
            }
        }

        let mut rng = StdRng::seed_from_u64( seed ) ;
        let mut nodes: Vec<VpNode> = Vec::with_capacity( points.len() ) ;
        let root = if points.is_empty() { None } else { Some( 0 ) } ;

        // Subtrees still to build: the ids they hold and the slot in their parent
        let mut work: Vec<( Vec<usize> , Option<( usize , Side )> )> = Vec::new() ;
        if !points.is_empty() {
            work.push( ( ( 0..points.len() ).collect() , None ) ) ;
        }
        while let Some( ( mut ids , parent ) ) = work.pop() {
            let vp = ids.swap_remove( rng.gen_range( 0..ids.len() ) ) ;
            let node_idx = nodes.len() ;
            match parent {
                Some( ( p , Side::Left ) ) => nodes[ p ].left = Some( node_idx ) ,
                Some( ( p , Side::Right ) ) => nodes[ p ].right = Some( node_idx ) ,
                None => {}
            }
            if ids.is_empty() {
                nodes.push( VpNode{ vp , mu: 0.0 , left: None , right: None } ) ;
                continue ;
            }

            let distances: Vec<f32> = ids.iter().map( | &id | euclid_distance( &points[ vp ] , &points[ id ] ) ).collect() ;
            let mu = median( &distances ) ;
            let mut left_ids: Vec<usize> = Vec::new() ;
            let mut right_ids: Vec<usize> = Vec::new() ;
            for ( &id , &d ) in ids.iter().zip( &distances ) {
                if d >= mu {
                    right_ids.push( id ) ;
                } else {
                    left_ids.push( id ) ;
                }
            }
            nodes.push( VpNode{ vp , mu , left: None , right: None } ) ;
            if !right_ids.is_empty() {
                work.push( ( right_ids , Some( ( node_idx , Side::Right ) ) ) ) ;
            }
            if !left_ids.is_empty() {
                work.push( ( left_ids , Some( ( node_idx , Side::Left ) ) ) ) ;
            }
        }

        debug!( points = points.len() , "vantage-point tree built" ) ;
        Ok( VpTree{ points , nodes , root , dimension } )
    }

    pub fn len( &self ) -> usize {
        self.points.len()
    }

    pub fn is_empty( &self ) -> bool {
        self.points.is_empty()
    }

    /// Length of the indexed vectors, 0 for an empty tree
    pub fn dimension( &self ) -> usize {
        self.dimension
    }

    pub fn point(
        &self ,
        id: usize
    ) -> Option<&[f32]> {
        self.points.get( id ).map( | point | point.as_slice() )
    }

    /// The `k` points nearest to `query`, nearest first. Ties are broken by the
    /// lower identifier
    /// # Errors
    /// [`PqError::Configuration`] if `k` is 0, [`PqError::Dimension`] if `query`
    /// has the wrong length
    pub fn nearest(
        &self ,
        query: &[f32] ,
        k: usize
    ) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err( PqError::Configuration( "k must be at least 1".to_string() ) ) ;
        }
        self.check_query( query )? ;
        let mut heap = BoundedMaxHeap::new( k.min( self.points.len() ) ) ;
        let mut visited = 0usize ;
        self.walk( query , | id , d | {
            visited += 1 ;
            if heap.threshold().map_or( true , | tau | d <= tau ) {
                heap.push( HeapEntry{ distance: d , id } ) ;
            }
            heap.threshold().unwrap_or( f32::INFINITY )
        } ) ;
        debug!( visited , k , "vantage-point nearest search finished" ) ;
        let mut neighbors = heap.drain_descending() ;
        neighbors.reverse() ;
        Ok( neighbors )
    }

    /// Every point whose distance to `query` is strictly below `radius`, nearest first
    /// # Errors
    /// [`PqError::Configuration`] if `radius` is NaN, [`PqError::Dimension`] if
    /// `query` has the wrong length
    pub fn within(
        &self ,
        query: &[f32] ,
        radius: f32
    ) -> Result<Vec<Neighbor>> {
        if radius.is_nan() {
            return Err( PqError::Configuration( "radius must be a number".to_string() ) ) ;
        }
        self.check_query( query )? ;
        let mut found: Vec<Neighbor> = Vec::new() ;
        self.walk( query , | id , d | {
            if d < radius {
                found.push( Neighbor{ id , distance: d } ) ;
            }
            radius
        } ) ;
        found.sort_by( | a , b | a.distance.total_cmp( &b.distance ).then( a.id.cmp( &b.id ) ) ) ;
        Ok( found )
    }

    fn check_query( &self , query: &[f32] ) -> Result<()> {
        if !self.points.is_empty() && query.len() != self.dimension {
            return Err( PqError::Dimension { context: "query" , index: 0 , expected: self.dimension , actual: query.len() } ) ;
        }
        Ok( () )
    }

    /// Visits vantage points depth-first, nearer side first. `visit` receives each
    /// vantage point with its distance to `query` and returns the radius `tau`
    /// used to prune the subtrees still pending
    fn walk<F>( &self , query: &[f32] , mut visit: F ) where F: FnMut( usize , f32 ) -> f32 {
        let mut stack: Vec<Pending> = Vec::new() ;
        if let Some( root ) = self.root {
            stack.push( Pending{ node: root , split: None } ) ;
        }
        let mut tau = f32::INFINITY ;
        while let Some( pending ) = stack.pop() {
            let reachable = match pending.split {
                None => true ,
                Some( ( Side::Left , d , mu ) ) => d <= mu + tau ,
                Some( ( Side::Right , d , mu ) ) => d >= mu - tau
            } ;
            if !reachable {
                continue ;
            }
            let node = &self.nodes[ pending.node ] ;
            let d = euclid_distance( query , &self.points[ node.vp ] ) ;
            tau = visit( node.vp , d ) ;

            let left = node.left.map( | n | Pending{ node: n , split: Some( ( Side::Left , d , node.mu ) ) } ) ;
            let right = node.right.map( | n | Pending{ node: n , split: Some( ( Side::Right , d , node.mu ) ) } ) ;
            // The side the query falls on is pushed last so it is searched first
            let ( first , second ) = if d < node.mu { ( left , right ) } else { ( right , left ) } ;
            stack.extend( second ) ;
            stack.extend( first ) ;
        }
    }

}

fn euclid_distance(
    vec1: &[f32] ,
    vec2: &[f32]
) -> f32 {
    ProductQuantizer::squared_euclid_distance( vec1 , vec2 ).sqrt()
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths
fn median( values: &[f32] ) -> f32 {
    let mut sorted = values.to_vec() ;
    sorted.sort_by( | a , b | a.total_cmp( b ) ) ;
    let mid = sorted.len() / 2 ;
    if sorted.len() % 2 == 0 {
        ( sorted[ mid - 1 ] + sorted[ mid ] ) / 2.0
    } else {
        sorted[ mid ]
    }
}
