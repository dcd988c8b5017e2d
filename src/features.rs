use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{PqError, Result};

/// Reads raw feature vectors, one per line, each holding exactly `dimension`
/// whitespace-separated numbers. Line `i` (0-based) becomes the vector with identifier `i`
/// # Arguments
/// * `reader` - Source of the feature lines
/// * `source_name` - Name used in error messages
/// * `dimension` - Expected number of components per vector
pub fn read_features<R: BufRead>(
    reader: R ,
    source_name: &str ,
    dimension: usize
) -> Result<Vec<Vec<f32>>> {
    let mut features: Vec<Vec<f32>> = Vec::new() ;
    for ( line_idx , line ) in reader.lines().enumerate() {
        let line_no = line_idx + 1 ;
        let line = line.map_err( | err | PqError::read_line( source_name , line_no , err ) )? ;
        let mut feature: Vec<f32> = Vec::with_capacity( dimension ) ;
        for token in line.split_whitespace() {
            let value: f32 = token.parse().map_err( | _ | PqError::format(
                source_name , line_no , format!( "`{}` is not a number" , token )
            ) )? ;
            feature.push( value ) ;
        }
        if feature.len() != dimension {
            return Err( PqError::format( source_name , line_no , format!(
                "expected {} values, found {}" , dimension , feature.len()
            ) ) ) ;
        }
        features.push( feature ) ;
    }
    Ok( features )
}

/// Opens `path` and reads it with [`read_features`]
pub fn read_features_from_path(
    path: impl AsRef<Path> ,
    dimension: usize
) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref() ;
    let file = File::open( path ).map_err( | err | PqError::Io { path: path.to_path_buf() , source: err } )? ;
    read_features( BufReader::new( file ) , &path.display().to_string() , dimension )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_one_vector_per_line() {
        let features = read_features( Cursor::new( "1 2 3\n-4.5 0 1e2\n" ) , "features" , 3 ).unwrap() ;
        assert_eq!( features , vec![ vec![ 1.0 , 2.0 , 3.0 ] , vec![ -4.5 , 0.0 , 100.0 ] ] ) ;
    }

    #[test]
    fn first_token_is_kept() {
        let features = read_features( Cursor::new( "7 8\n" ) , "features" , 2 ).unwrap() ;
        assert_eq!( features[ 0 ] , vec![ 7.0 , 8.0 ] ) ;
    }

    #[test]
    fn wrong_field_count_reports_line() {
        let err = read_features( Cursor::new( "1 2\n1 2 3\n" ) , "features" , 2 ).unwrap_err() ;
        match err {
            PqError::Format { line , source_name , .. } => {
                assert_eq!( line , 2 ) ;
                assert_eq!( source_name , "features" ) ;
            }
            other => panic!( "unexpected error {:?}" , other )
        }
    }

    #[test]
    fn blank_line_is_a_format_error() {
        assert!( read_features( Cursor::new( "1 2\n\n" ) , "features" , 2 ).unwrap_err().is_format_error() ) ;
    }

    #[test]
    fn unparsable_token_is_a_format_error() {
        let err = read_features( Cursor::new( "1 two\n" ) , "features" , 2 ).unwrap_err() ;
        assert!( err.is_format_error() ) ;
    }

    #[test]
    fn invalid_utf8_is_a_format_error() {
        let err = read_features( Cursor::new( &b"1 2\n0 \xFF 1\n"[..] ) , "features" , 3 ).unwrap_err() ;
        assert!( err.is_format_error() ) ;
        match err {
            PqError::Format { line , reason , .. } => {
                assert_eq!( line , 2 ) ;
                assert!( reason.contains( "UTF-8" ) ) ;
            }
            other => panic!( "unexpected error {:?}" , other )
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap() ;
        let err = read_features_from_path( dir.path().join( "absent" ) , 2 ).unwrap_err() ;
        assert!( matches!( err , PqError::Io { .. } ) ) ;
    }
}
