use std::sync::Arc;

use asymmetric_pq::{select_top_k, Codebook, CorpusIndex, PqConfig, PqIndex, ProductQuantizer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level( Level::DEBUG )
        .with_target( false )
        .finish() ;
    tracing::subscriber::set_global_default( subscriber )? ;

    let src_vec_dims = 8 ;
    let subspace_width = 2 ;

    // Four centroids per subspace, each a point on the diagonal
    let codewords: Vec<Vec<Vec<f32>>> = ( 0..src_vec_dims / subspace_width )
        .map( | _ | vec![
            vec![ -4.0 , -4.0 ] , vec![ 0.0 , 0.0 ] , vec![ 3.4 , 3.4 ] , vec![ 10.0 , 10.0 ]
        ] )
        .collect() ;
    let codebook = Codebook::from_centroids( codewords )? ;

    let vectors: Vec<Vec<f32>> =  vec![
        vec![ 5.2 , 3.4 , 1.5 , 3.4 , -3.4 , 3.4 , 0.0, 3.4 ] ,
        vec![ 1.2 , 3.4 , 1.2 , 3.4 , 3.4 , -3.4 , 10.4 , 3.4 ] ,
        vec![ -1.2 , 3.4 , 1.2 , 3.4 , 3.4 , 3.4 , 3.4 , 3.4 ] ,
        vec![ 1.2 , 3.4 , 0.0 , 3.4 , 23.4 , 3.4 , 2.4 , 3.4096 ] ,
        vec![ 1.2 , 3.4 , 2.2 , 3.42 , 3.4 , 3.4 , 3.4 , 3.4 ] ,
        vec![ -1.2 , 3.4 , 1.2 , 3.4 , 3.4 , 4.4 , 3.4 , 3.4 ] ,
        vec![ 1.2 , 3.4 , 1.2 , 3.9 , 3.4 , -10.4 , 3.4 , 3.4 ] ,
        vec![ 1.2 , 3.4 , 1.2 , 3.4 , 0.0 , 3.4 , 3.4 , 3.4 ]
    ] ;

    // The individual stages
    let quantizer = ProductQuantizer::new( Arc::new( codebook.clone() ) ) ;
    let vector_codes: CorpusIndex<u8> = quantizer.encode( &vectors )? ;
    let dtable = quantizer.dtable( &vectors[4] )? ;
    let selection = select_top_k( &vector_codes , &dtable , 3 )? ;
    println!( "{:?}" , vector_codes ) ;
    println!( "{:?}" , dtable ) ;
    println!( "{:?}" , selection.ascending() ) ;

    // The same search through the index
    let config = PqConfig::new( src_vec_dims , subspace_width ).with_cluster_count( 4 ) ;
    let index: PqIndex<u8> = PqIndex::from_vectors( config , codebook , &vectors )? ;
    let candidates = index.query( &vectors[4] , 3 )? ;
    info!( ?candidates , "nearest candidates, farthest first" ) ;
    Ok( () )
}
