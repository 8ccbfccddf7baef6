use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use fxprof_symbolicate::{
    load_profile, save_profile, Error, OffsetAdjustment, Symbolicator, DEFAULT_BATCH_SIZE,
};

#[derive(Debug, Parser)]
#[command(
    name = "fxprof-symbolicate",
    version,
    about = r#"
fxprof-symbolicate resolves raw addresses in a profiler capture to symbols.

It reads a Firefox profiler JSON file, looks up every 0xADDR string-table
entry in the profile's library ranges, resolves the addresses with an
external addr2line tool against the library binaries found under the
configured search directories, and writes the symbolicated profile next
to the input.

EXAMPLES:
    # Pull the device libraries once, then symbolicate:
    adb pull /system/lib ./remote-libs
    fxprof-symbolicate gecko_profile.json

    # With an NDK toolchain's addr2line and an objdir:
    fxprof-symbolicate --addr2line ~/ndk/bin/arm-linux-androideabi-addr2line \
        --lib-dir ~/objdir/dist --lib-dir ./remote-libs gecko_profile.json
"#
)]
struct Opt {
    /// Path to the profile file that should be symbolicated.
    profile: PathBuf,

    /// Directory that is scanned recursively for library binaries.
    /// Can be given multiple times; later directories win on name clashes.
    #[arg(long = "lib-dir", value_name = "DIR", default_values_os_t = vec![PathBuf::from("remote-libs")])]
    lib_dirs: Vec<PathBuf>,

    /// The addr2line executable to invoke.
    #[arg(long, default_value = "addr2line")]
    addr2line: PathBuf,

    /// Maximum number of addresses passed to one addr2line invocation.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Timeout for a single addr2line invocation, e.g. "30s" or "2min".
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Clear the Thumb instruction-mode bit when computing library-relative
    /// offsets. Only needed for ARM binaries whose symbol addresses carry
    /// the mode bit.
    #[arg(long)]
    thumb_offsets: bool,

    /// Output filename. Defaults to the input path with ".sym" appended.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let opt = Opt::parse();
    if let Err(err) = run(opt).await {
        eprintln!("fxprof-symbolicate: {err}");
        std::process::exit(1);
    }
}

async fn run(opt: Opt) -> Result<(), Error> {
    let mut profile = load_profile(&opt.profile)?;

    let adjustment = if opt.thumb_offsets {
        OffsetAdjustment::ThumbBit
    } else {
        OffsetAdjustment::Plain
    };
    let symbolicator = Symbolicator::new(
        opt.lib_dirs,
        opt.addr2line,
        opt.timeout,
        opt.batch_size,
        adjustment,
    );
    symbolicator.symbolicate_profile(&mut profile).await?;

    let output_path = opt
        .output
        .unwrap_or_else(|| default_output_path(&opt.profile));
    save_profile(&profile, &output_path)?;
    println!("Wrote symbolicated profile to {}", output_path.display());
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    if input.extension() == Some(OsStr::new("gz")) {
        // profile.json.gz -> profile.json.sym.gz, so the output stays a
        // well-formed gzip filename.
        input.with_extension("sym.gz")
    } else {
        let mut path = input.as_os_str().to_owned();
        path.push(".sym");
        PathBuf::from(path)
    }
}
