//! Bounded top-K selection over an encoded corpus.
//!
//! The corpus is scanned once in identifier order. A max-heap holds the best K
//! candidates seen so far; its top is the current K-th best distance. Summing a
//! candidate's table lookups stops as soon as the partial sum exceeds that
//! bound. Every table entry is a squared distance and thus non-negative, so an
//! abandoned candidate could never have entered the heap and the result is the
//! exact top-K under the asymmetric distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use num_traits::ToPrimitive;
use tracing::debug;

use crate::error::{PqError, Result};
use crate::pq::{code_index, CorpusIndex, DistanceTable};

/// A corpus vector together with its asymmetric distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize ,
    pub distance: f32
}

/// Work done by one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    /// Corpus vectors visited
    pub scanned: usize ,
    /// Corpus vectors abandoned before all subspaces were summed
    pub pruned: usize
}

/// Result of [`select_top_k`]
///
/// Entries are kept in the order they leave the heap, which is from the
/// largest to the smallest retained distance. Use [`Selection::ascending`] for
/// nearest-first order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    drained: Vec<Neighbor> ,
    stats: SelectionStats
}

impl Selection {

    /// Neighbors in heap drain order, farthest first
    pub fn drain_order( &self ) -> &[Neighbor] {
        &self.drained
    }

    pub fn drain_order_ids( &self ) -> Vec<usize> {
        self.drained.iter().map( | neighbor | neighbor.id ).collect()
    }

    /// Neighbors sorted nearest first
    pub fn ascending( &self ) -> Vec<Neighbor> {
        self.drained.iter().rev().copied().collect()
    }

    pub fn ascending_ids( &self ) -> Vec<usize> {
        self.drained.iter().rev().map( | neighbor | neighbor.id ).collect()
    }

    pub fn len( &self ) -> usize {
        self.drained.len()
    }

    pub fn is_empty( &self ) -> bool {
        self.drained.is_empty()
    }

    pub fn stats( &self ) -> SelectionStats {
        self.stats
    }
}

/// Heap entry ordered by distance, then by identifier, so that among equal
/// distances the later vector is evicted first
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeapEntry {
    pub(crate) distance: f32 ,
    pub(crate) id: usize
}

impl PartialEq for HeapEntry {
    fn eq( &self , other: &Self ) -> bool {
        self.cmp( other ) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp( &self , other: &Self ) -> Option<Ordering> {
        Some( self.cmp( other ) )
    }
}

impl Ord for HeapEntry {
    fn cmp( &self , other: &Self ) -> Ordering {
        self.distance.total_cmp( &other.distance ).then( self.id.cmp( &other.id ) )
    }
}

/// Max-heap that keeps the `capacity` smallest entries pushed into it
pub(crate) struct BoundedMaxHeap {
    heap: BinaryHeap<HeapEntry> ,
    capacity: usize
}

impl BoundedMaxHeap {

    pub(crate) fn new( capacity: usize ) -> Self {
        BoundedMaxHeap{ heap: BinaryHeap::with_capacity( capacity + 1 ) , capacity }
    }

    /// Largest retained distance once the heap is full, `None` while there is no bound yet
    pub(crate) fn threshold( &self ) -> Option<f32> {
        if self.heap.len() < self.capacity {
            return None ;
        }
        self.heap.peek().map( | entry | entry.distance )
    }

    pub(crate) fn push( &mut self , entry: HeapEntry ) {
        self.heap.push( entry ) ;
        if self.heap.len() > self.capacity {
            self.heap.pop() ;
        }
    }

    /// Empties the heap by repeated pops, largest entry first
    pub(crate) fn drain_descending( mut self ) -> Vec<Neighbor> {
        let mut drained: Vec<Neighbor> = Vec::with_capacity( self.heap.len() ) ;
        while let Some( entry ) = self.heap.pop() {
            drained.push( Neighbor{ id: entry.id , distance: entry.distance } ) ;
        }
        drained
    }
}

/// Selects the `k` corpus vectors with the smallest asymmetric distance
/// # Arguments
/// * `corpus` - Encoded vectors produced by [`crate::ProductQuantizer::encode`]
/// * `table` - Distance table of the query, from [`crate::ProductQuantizer::dtable`]
/// * `k` - Number of neighbors to return. If the corpus holds fewer vectors, all are returned
/// # Errors
/// [`PqError::Configuration`] if `k` is 0, [`PqError::Dimension`] if a code does not
/// match the table's shape
pub fn select_top_k<T>(
    corpus: &CorpusIndex<T> ,
    table: &DistanceTable ,
    k: usize
) -> Result<Selection> where T: ToPrimitive {
    if k == 0 {
        return Err( PqError::Configuration( "top-k must be at least 1".to_string() ) ) ;
    }
    let mut heap = BoundedMaxHeap::new( k.min( corpus.len() ) ) ;
    let mut stats = SelectionStats::default() ;

    for ( id , code ) in corpus.iter().enumerate() {
        if code.len() != table.subspace_count() {
            return Err( PqError::Dimension {
                context: "code" , index: id , expected: table.subspace_count() , actual: code.len()
            } ) ;
        }
        stats.scanned += 1 ;
        let threshold = heap.threshold() ;
        let mut distance = 0.0f32 ;
        let mut pruned = false ;
        for ( m , c ) in code.iter().enumerate() {
            distance += lookup( table , m , c , id )? ;
            if threshold.map_or( false , | bound | distance > bound ) {
                pruned = true ;
                break ;
            }
        }
        if pruned {
            stats.pruned += 1 ;
            continue ;
        }
        heap.push( HeapEntry{ distance , id } ) ;
    }

    debug!( scanned = stats.scanned , pruned = stats.pruned , k , "top-k scan finished" ) ;
    Ok( Selection{ drained: heap.drain_descending() , stats } )
}

/// Collects every corpus vector whose asymmetric distance to the query is
/// strictly below `radius`, nearest first. A vector is abandoned as soon as its
/// partial sum reaches `radius`
/// # Errors
/// [`PqError::Configuration`] if `radius` is NaN, [`PqError::Dimension`] if a code
/// does not match the table's shape
pub fn select_within<T>(
    corpus: &CorpusIndex<T> ,
    table: &DistanceTable ,
    radius: f32
) -> Result<Vec<Neighbor>> where T: ToPrimitive {
    if radius.is_nan() {
        return Err( PqError::Configuration( "radius must be a number".to_string() ) ) ;
    }
    let mut found: Vec<Neighbor> = Vec::new() ;
    let mut pruned = 0usize ;
    for ( id , code ) in corpus.iter().enumerate() {
        if code.len() != table.subspace_count() {
            return Err( PqError::Dimension {
                context: "code" , index: id , expected: table.subspace_count() , actual: code.len()
            } ) ;
        }
        let mut distance = 0.0f32 ;
        let mut inside = true ;
        for ( m , c ) in code.iter().enumerate() {
            distance += lookup( table , m , c , id )? ;
            if distance >= radius {
                inside = false ;
                break ;
            }
        }
        if inside {
            found.push( Neighbor{ id , distance } ) ;
        } else {
            pruned += 1 ;
        }
    }
    found.sort_by( | a , b | a.distance.total_cmp( &b.distance ).then( a.id.cmp( &b.id ) ) ) ;
    debug!( scanned = corpus.len() , pruned , found = found.len() , "radius scan finished" ) ;
    Ok( found )
}

fn lookup<T: ToPrimitive>(
    table: &DistanceTable ,
    m: usize ,
    code: &T ,
    id: usize
) -> Result<f32> {
    code_index( code )
        .and_then( | c | table.get( m , c ) )
        .ok_or_else( || PqError::Dimension {
            context: "code" ,
            index: id ,
            expected: table.row( m ).map_or( 0 , | row | row.len() ) ,
            actual: code_index( code ).unwrap_or( usize::MAX )
        } )
}
