use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::bufread::GzDecoder;
use flate2::{Compression, GzBuilder};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// Level two has an acceptable trade-off between how long compression
// takes and how much data it saves on the profile JSONs I tested with.
const GZIP_COMPRESSION_LEVEL: u32 = 2;

/// A profiler capture. Only `libs` and `threads` are interpreted; every
/// other field is carried through untouched via the flattened map.
#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
pub struct Profile {
    #[serde(default)]
    pub libs: Vec<Lib>,
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A library that was loaded in the profiled process. `start..end` is the
/// absolute address range it occupied; `offset` is added to
/// `address - start` to obtain the file-relative offset addr2line expects.
#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lib {
    pub name: String,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Deduplicated strings referenced by index from the thread's samples.
    /// Entries of the form `0xHEX` are unresolved addresses. Absent on
    /// some threads; those pass through unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_table: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

pub fn load_profile(path: &Path) -> Result<Profile, Error> {
    let file = File::open(path).map_err(|e| Error::ReadProfile(path.to_owned(), e))?;
    let reader = BufReader::new(file);

    // Handle .gz profiles
    if path.extension() == Some(OsStr::new("gz")) {
        let decoder = GzDecoder::new(reader);
        let reader = BufReader::new(decoder);
        serde_json::from_reader(reader).map_err(|e| Error::ParseProfile(path.to_owned(), e))
    } else {
        serde_json::from_reader(reader).map_err(|e| Error::ParseProfile(path.to_owned(), e))
    }
}

pub fn save_profile(profile: &Profile, output_path: &Path) -> Result<(), Error> {
    let output_file =
        File::create(output_path).map_err(|e| Error::WriteProfile(output_path.to_owned(), e))?;
    let writer = BufWriter::new(output_file);

    let is_gz = output_path.extension() == Some(OsStr::new("gz"));
    if is_gz {
        let name_without_gz = output_path.file_stem().unwrap_or_default().to_string_lossy();
        let builder = GzBuilder::new().filename(name_without_gz.as_bytes());
        let gz = builder.write(writer, Compression::new(GZIP_COMPRESSION_LEVEL));
        let mut gz = BufWriter::new(gz);
        serde_json::to_writer(&mut gz, profile)
            .map_err(|e| Error::WriteProfile(output_path.to_owned(), e.into()))?;
        let gz = gz
            .into_inner()
            .map_err(|e| Error::WriteProfile(output_path.to_owned(), e.into_error()))?;
        let mut file_writer = gz
            .finish()
            .map_err(|e| Error::WriteProfile(output_path.to_owned(), e))?;
        file_writer
            .flush()
            .map_err(|e| Error::WriteProfile(output_path.to_owned(), e))?;
    } else {
        let mut writer = writer;
        serde_json::to_writer(&mut writer, profile)
            .map_err(|e| Error::WriteProfile(output_path.to_owned(), e.into()))?;
        writer
            .flush()
            .map_err(|e| Error::WriteProfile(output_path.to_owned(), e))?;
    }
    Ok(())
}
