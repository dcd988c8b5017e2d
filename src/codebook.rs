use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PqError, Result};

/// Immutable set of per-subspace centroids
///
/// `codewords` has dims ( n_subspaces , n_centroids , subspace_width ). Every
/// centroid of every sub-codebook has exactly `subspace_width` components.
#[derive(Debug, Clone, PartialEq)]
pub struct Codebook {
    codewords: Vec<Vec<Vec<f32>>> ,
    subspace_width: usize
}

impl Codebook {

    /// Builds a [`Codebook`] from centroids already held in memory
    /// # Arguments
    /// * `codewords` - One list of centroids per subspace
    /// # Errors
    /// [`PqError::Format`] if a subspace has no centroids or centroid lengths differ
    pub fn from_centroids(
        codewords: Vec<Vec<Vec<f32>>>
    ) -> Result<Self> {
        if codewords.is_empty() {
            return Err( PqError::format( "codebook" , 0 , "no subspaces" ) ) ;
        }
        let mut subspace_width: Option<usize> = None ;
        for ( m , centroids ) in codewords.iter().enumerate() {
            let name = format!( "subspace {}" , m ) ;
            let width = Codebook::check_sub_codebook( centroids , &name )? ;
            match subspace_width {
                None => subspace_width = Some( width ) ,
                Some( expected ) if expected != width => {
                    return Err( PqError::format( &name , 0 , format!(
                        "centroids have {} components, earlier subspaces have {}" , width , expected
                    ) ) ) ;
                }
                Some( _ ) => {}
            }
        }
        let subspace_width = subspace_width.unwrap_or( 0 ) ;
        Ok( Codebook{ codewords , subspace_width } )
    }

    /// Reads one sub-codebook per source. In each line the first token is an id
    /// field and is skipped; the remaining tokens form one centroid.
    /// # Arguments
    /// * `sources` - Readers yielding the centroid records, in subspace order
    /// * `subspace_count` - Number of subspaces `M` expected
    /// # Errors
    /// [`PqError::Format`] on malformed lines or if fewer than `subspace_count`
    /// sources are given
    pub fn load<I, R>(
        sources: I ,
        subspace_count: usize
    ) -> Result<Self> where I: IntoIterator<Item = R> , R: BufRead {
        let mut codewords: Vec<Vec<Vec<f32>>> = Vec::with_capacity( subspace_count ) ;
        let mut sources = sources.into_iter() ;
        for m in 0..subspace_count {
            let name = format!( "subspace {}" , m ) ;
            let reader = sources.next().ok_or_else( || PqError::format(
                &name , 0 , format!( "missing centroid record, expected {} records" , subspace_count )
            ) )? ;
            codewords.push( Codebook::read_sub_codebook( reader , &name )? ) ;
        }
        Codebook::from_centroids( codewords )
    }

    /// Loads centroids from `<prefix>/cluster.1` .. `<prefix>/cluster.<subspace_count>`
    /// # Arguments
    /// * `prefix` - Directory holding the centroid files
    /// * `subspace_count` - Number of subspaces `M`
    pub fn load_from_prefix(
        prefix: impl AsRef<Path> ,
        subspace_count: usize
    ) -> Result<Self> {
        let mut codewords: Vec<Vec<Vec<f32>>> = Vec::with_capacity( subspace_count ) ;
        for m in 0..subspace_count {
            let path = Codebook::centroid_path( prefix.as_ref() , m ) ;
            let file = File::open( &path ).map_err( | err | match err.kind() {
                std::io::ErrorKind::NotFound => PqError::MissingSubspace { subspace: m , path: path.clone() } ,
                _ => PqError::Io { path: path.clone() , source: err }
            } )? ;
            debug!( path = %path.display() , subspace = m , "reading centroids" ) ;
            codewords.push( Codebook::read_sub_codebook( BufReader::new( file ) , &path.display().to_string() )? ) ;
        }
        Codebook::from_centroids( codewords )
    }

    /// Path of the centroid file for 0-based subspace `m`; files are numbered from 1
    pub fn centroid_path(
        prefix: &Path ,
        m: usize
    ) -> PathBuf {
        prefix.join( format!( "cluster.{}" , m + 1 ) )
    }

    /// Number of subspaces `M`
    pub fn subspace_count( &self ) -> usize {
        self.codewords.len()
    }

    /// Number of components `k` in each subspace slice
    pub fn subspace_width( &self ) -> usize {
        self.subspace_width
    }

    /// Dimensionality `D = M * k` of the vectors this codebook quantizes
    pub fn dimension( &self ) -> usize {
        self.subspace_count() * self.subspace_width
    }

    /// Number of centroids in sub-codebook `m`
    pub fn cluster_count(
        &self ,
        m: usize
    ) -> usize {
        self.codewords.get( m ).map_or( 0 , | centroids | centroids.len() )
    }

    /// Largest number of centroids held by any sub-codebook
    pub fn max_cluster_count( &self ) -> usize {
        self.codewords.iter().map( | centroids | centroids.len() ).max().unwrap_or( 0 )
    }

    pub fn centroid(
        &self ,
        m: usize ,
        c: usize
    ) -> Option<&[f32]> {
        self.codewords.get( m )?.get( c ).map( | centroid | centroid.as_slice() )
    }

    /// All centroids of sub-codebook `m`
    pub fn centroids(
        &self ,
        m: usize
    ) -> Option<&[Vec<f32>]> {
        self.codewords.get( m ).map( | centroids | centroids.as_slice() )
    }

    /// Sub-codebooks in subspace order
    pub(crate) fn sub_codebooks( &self ) -> &[Vec<Vec<f32>>] {
        &self.codewords
    }

    fn read_sub_codebook<R: BufRead>(
        reader: R ,
        source_name: &str
    ) -> Result<Vec<Vec<f32>>> {
        let mut centroids: Vec<Vec<f32>> = Vec::new() ;
        for ( line_idx , line ) in reader.lines().enumerate() {
            let line_no = line_idx + 1 ;
            let line = line.map_err( | err | PqError::read_line( source_name , line_no , err ) )? ;

            // The leading token is an id field and is never parsed
            let mut tokens = line.split_whitespace() ;
            tokens.next() ;
            let mut centroid: Vec<f32> = Vec::new() ;
            for token in tokens {
                let value: f32 = token.parse().map_err( | _ | PqError::format(
                    source_name , line_no , format!( "`{}` is not a number" , token )
                ) )? ;
                centroid.push( value ) ;
            }
            if centroid.is_empty() {
                return Err( PqError::format( source_name , line_no , "no centroid components after the id field" ) ) ;
            }
            if let Some( first ) = centroids.first() {
                if first.len() != centroid.len() {
                    return Err( PqError::format( source_name , line_no , format!(
                        "centroid has {} components, expected {}" , centroid.len() , first.len()
                    ) ) ) ;
                }
            }
            centroids.push( centroid ) ;
        }
        Ok( centroids )
    }

    fn check_sub_codebook(
        centroids: &[Vec<f32>] ,
        source_name: &str
    ) -> Result<usize> {
        let width = match centroids.first() {
            Some( first ) => first.len() ,
            None => return Err( PqError::format( source_name , 0 , "no centroids" ) )
        } ;
        if width == 0 {
            return Err( PqError::format( source_name , 1 , "centroid has no components" ) ) ;
        }
        for ( c , centroid ) in centroids.iter().enumerate() {
            if centroid.len() != width {
                return Err( PqError::format( source_name , c + 1 , format!(
                    "centroid has {} components, expected {}" , centroid.len() , width
                ) ) ) ;
            }
        }
        Ok( width )
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn load_skips_id_token() {
        let sources = vec![
            Cursor::new( "7 0 0\n8 10 10\n" ) ,
            Cursor::new( "1 1.5 2.5\n2 -3 4\n" )
        ] ;
        let codebook = Codebook::load( sources , 2 ).unwrap() ;
        assert_eq!( codebook.subspace_count() , 2 ) ;
        assert_eq!( codebook.subspace_width() , 2 ) ;
        assert_eq!( codebook.dimension() , 4 ) ;
        assert_eq!( codebook.cluster_count( 0 ) , 2 ) ;
        assert_eq!( codebook.centroid( 0 , 1 ) , Some( &[ 10.0 , 10.0 ][..] ) ) ;
        assert_eq!( codebook.centroid( 1 , 1 ) , Some( &[ -3.0 , 4.0 ][..] ) ) ;
    }

    #[test]
    fn id_token_is_not_parsed() {
        let codebook = Codebook::load( vec![ Cursor::new( "c0 1 2\nc1 3 4\n" ) ] , 1 ).unwrap() ;
        assert_eq!( codebook.centroid( 0 , 0 ) , Some( &[ 1.0 , 2.0 ][..] ) ) ;
    }

    #[test]
    fn line_with_only_id_is_rejected() {
        let err = Codebook::load( vec![ Cursor::new( "0 1 2\n5\n" ) ] , 1 ).unwrap_err() ;
        match err {
            PqError::Format { line , .. } => assert_eq!( line , 2 ) ,
            other => panic!( "unexpected error {:?}" , other )
        }
    }

    #[test]
    fn blank_line_is_rejected() {
        let err = Codebook::load( vec![ Cursor::new( "0 1 2\n\n1 3 4\n" ) ] , 1 ).unwrap_err() ;
        assert!( err.is_format_error() ) ;
    }

    #[test]
    fn inconsistent_centroid_lengths_are_rejected() {
        let err = Codebook::load( vec![ Cursor::new( "0 1 2\n1 3 4 5\n" ) ] , 1 ).unwrap_err() ;
        match err {
            PqError::Format { line , source_name , .. } => {
                assert_eq!( line , 2 ) ;
                assert_eq!( source_name , "subspace 0" ) ;
            }
            other => panic!( "unexpected error {:?}" , other )
        }
    }

    #[test]
    fn widths_must_agree_across_subspaces() {
        let sources = vec![ Cursor::new( "0 1 2\n" ) , Cursor::new( "0 1 2 3\n" ) ] ;
        assert!( Codebook::load( sources , 2 ).unwrap_err().is_format_error() ) ;
    }

    #[test]
    fn missing_record_is_rejected() {
        let err = Codebook::load( vec![ Cursor::new( "0 1 2\n" ) ] , 2 ).unwrap_err() ;
        assert!( err.is_format_error() ) ;
    }

    #[test]
    fn unparsable_token_is_rejected() {
        let err = Codebook::load( vec![ Cursor::new( "0 1 x\n" ) ] , 1 ).unwrap_err() ;
        assert!( err.to_string().contains( "`x` is not a number" ) ) ;
    }

    #[test]
    fn empty_record_is_rejected() {
        assert!( Codebook::load( vec![ Cursor::new( "" ) ] , 1 ).is_err() ) ;
    }

    #[test]
    fn invalid_utf8_is_a_format_error() {
        let sources = vec![ Cursor::new( &b"0 \xFF 1\n"[..] ) ] ;
        let err = Codebook::load( sources , 1 ).unwrap_err() ;
        assert!( err.is_format_error() ) ;
        match err {
            PqError::Format { line , source_name , .. } => {
                assert_eq!( line , 1 ) ;
                assert_eq!( source_name , "subspace 0" ) ;
            }
            other => panic!( "unexpected error {:?}" , other )
        }
    }

    #[test]
    fn centroids_out_of_range_is_none() {
        let codebook = Codebook::load( vec![ Cursor::new( "0 1 2\n1 3 4\n" ) ] , 1 ).unwrap() ;
        assert_eq!( codebook.centroids( 0 ).map( | centroids | centroids.len() ) , Some( 2 ) ) ;
        assert!( codebook.centroids( 1 ).is_none() ) ;
        assert!( codebook.centroid( 0 , 2 ).is_none() ) ;
    }

    #[test]
    fn centroid_files_are_numbered_from_one() {
        let path = Codebook::centroid_path( Path::new( "clusters" ) , 0 ) ;
        assert_eq!( path , Path::new( "clusters" ).join( "cluster.1" ) ) ;
    }

    #[test]
    fn load_from_prefix_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap() ;
        std::fs::write( dir.path().join( "cluster.1" ) , "0 1 2\n" ).unwrap() ;
        let err = Codebook::load_from_prefix( dir.path() , 2 ).unwrap_err() ;
        match err {
            PqError::MissingSubspace { subspace , .. } => assert_eq!( subspace , 1 ) ,
            other => panic!( "unexpected error {:?}" , other )
        }
    }
}
