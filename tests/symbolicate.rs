//! End-to-end tests that drive the full pipeline against a fake
//! addr2line executable (a small shell script), so no real binutils
//! installation is needed.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fxprof_symbolicate::profile::{Lib, Profile, Thread};
use fxprof_symbolicate::{OffsetAdjustment, Symbolicator};

/// Prints "func_<addr>" and "<addr>.cpp:42" for every address argument,
/// mirroring addr2line's two-lines-per-address output contract.
const FAKE_ADDR2LINE: &str = r#"#!/bin/sh
# args: -e <binary> -f -C <addr>...
shift 4
for addr in "$@"; do
    printf 'func_%s\n' "$addr"
    printf '%s.cpp:42\n' "$addr"
done
"#;

/// Produces no output at all, like a resolver that crashed on startup.
const SILENT_ADDR2LINE: &str = "#!/bin/sh\nexit 0\n";

/// Hangs long enough to trip any reasonable timeout.
const HANGING_ADDR2LINE: &str = "#!/bin/sh\nsleep 30\n";

fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

struct TestSetup {
    _dir: tempfile::TempDir,
    addr2line: PathBuf,
    lib_dir: PathBuf,
}

fn setup(addr2line_script: &str) -> TestSetup {
    let dir = tempfile::tempdir().unwrap();
    let addr2line = dir.path().join("fake-addr2line");
    write_executable(&addr2line, addr2line_script);
    let lib_dir = dir.path().join("libs");
    fs::create_dir(&lib_dir).unwrap();
    fs::write(lib_dir.join("libxul.so"), b"not a real elf").unwrap();
    TestSetup {
        _dir: dir,
        addr2line,
        lib_dir,
    }
}

fn symbolicator(setup: &TestSetup, batch_size: usize) -> Symbolicator {
    Symbolicator::new(
        vec![setup.lib_dir.clone()],
        setup.addr2line.clone(),
        Duration::from_secs(10),
        batch_size,
        OffsetAdjustment::Plain,
    )
}

fn lib(name: &str, start: u64, end: u64, offset: u64) -> Lib {
    Lib {
        name: name.to_string(),
        start,
        end,
        offset,
        other: Default::default(),
    }
}

fn thread(strings: &[&str]) -> Thread {
    Thread {
        string_table: Some(strings.iter().map(|s| s.to_string()).collect()),
        other: Default::default(),
    }
}

fn strings(profile: &Profile, thread_index: usize) -> &[String] {
    profile.threads[thread_index].string_table.as_deref().unwrap()
}

#[tokio::test]
async fn resolves_addresses_and_leaves_everything_else_alone() {
    let setup = setup(FAKE_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0)],
        threads: vec![thread(&["GeckoMain", "0x1050", "0x9999", "not an address"])],
        other: Default::default(),
    };

    symbolicator(&setup, 1000)
        .symbolicate_profile(&mut profile)
        .await
        .unwrap();

    assert_eq!(
        strings(&profile, 0),
        &["GeckoMain", "func_0x50", "0x9999", "not an address"]
    );
}

#[tokio::test]
async fn batch_boundaries_do_not_affect_attribution() {
    let setup = setup(FAKE_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0)],
        threads: vec![thread(&["0x1010", "0x1020", "0x1030", "0x1040", "0x1050"])],
        other: Default::default(),
    };

    // Batch size 1 forces one resolver process per address, all running
    // concurrently.
    symbolicator(&setup, 1)
        .symbolicate_profile(&mut profile)
        .await
        .unwrap();

    assert_eq!(
        strings(&profile, 0),
        &["func_0x10", "func_0x20", "func_0x30", "func_0x40", "func_0x50"]
    );
}

#[tokio::test]
async fn concurrent_threads_get_their_own_symbols() {
    let setup = setup(FAKE_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0)],
        threads: vec![
            thread(&["0x1001", "0x1002"]),
            thread(&["0x1003", "0x1004"]),
        ],
        other: Default::default(),
    };

    symbolicator(&setup, 1)
        .symbolicate_profile(&mut profile)
        .await
        .unwrap();

    assert_eq!(strings(&profile, 0), &["func_0x1", "func_0x2"]);
    assert_eq!(strings(&profile, 1), &["func_0x3", "func_0x4"]);
}

#[tokio::test]
async fn library_offset_is_applied() {
    let setup = setup(FAKE_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0x40)],
        threads: vec![thread(&["0x1010"])],
        other: Default::default(),
    };

    symbolicator(&setup, 1000)
        .symbolicate_profile(&mut profile)
        .await
        .unwrap();

    assert_eq!(strings(&profile, 0), &["func_0x50"]);
}

#[tokio::test]
async fn empty_resolver_output_degrades_to_fallback_labels() {
    let setup = setup(SILENT_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0)],
        threads: vec![thread(&["0x1050", "0x1060", "Compositor"])],
        other: Default::default(),
    };

    symbolicator(&setup, 1000)
        .symbolicate_profile(&mut profile)
        .await
        .unwrap();

    assert_eq!(
        strings(&profile, 0),
        &["0x50 in libxul.so", "0x60 in libxul.so", "Compositor"]
    );
}

#[tokio::test]
async fn hanging_resolver_times_out_into_fallback_labels() {
    let setup = setup(HANGING_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0)],
        threads: vec![thread(&["0x1050"])],
        other: Default::default(),
    };

    let symbolicator = Symbolicator::new(
        vec![setup.lib_dir.clone()],
        setup.addr2line.clone(),
        Duration::from_millis(200),
        1000,
        OffsetAdjustment::Plain,
    );
    symbolicator.symbolicate_profile(&mut profile).await.unwrap();

    assert_eq!(strings(&profile, 0), &["0x50 in libxul.so"]);
}

#[tokio::test]
async fn unknown_library_never_invokes_the_resolver() {
    // The fake tool would produce real symbols; libfoo.so isn't in the
    // search root, so fallback labels must appear without running it.
    let setup = setup(FAKE_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libfoo.so", 0x1000, 0x2000, 0)],
        threads: vec![thread(&["0x1050"])],
        other: Default::default(),
    };

    symbolicator(&setup, 1000)
        .symbolicate_profile(&mut profile)
        .await
        .unwrap();

    assert_eq!(strings(&profile, 0), &["0x50 in libfoo.so"]);
}

#[tokio::test]
async fn symbolication_is_idempotent() {
    let setup = setup(FAKE_ADDR2LINE);
    let mut profile = Profile {
        libs: vec![lib("libxul.so", 0x1000, 0x2000, 0)],
        threads: vec![thread(&["0x1050", "0x9999"])],
        other: Default::default(),
    };

    let symbolicator = symbolicator(&setup, 1000);
    symbolicator.symbolicate_profile(&mut profile).await.unwrap();
    let after_first = profile.clone();
    symbolicator.symbolicate_profile(&mut profile).await.unwrap();
    assert_eq!(profile, after_first);
}
