pub mod ase;

pub use ase::{AseAttribute, AseError, AseMesh, AseScene, AseUvChannel, ParseResult, parse_str};
