use std::env;
use std::path::PathBuf;

const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];

fn warn(message: &str) {
    println!("cargo:warning={message}");
}

/// Point Windows builds at a vcpkg FFmpeg install when `FFMPEG_DIR` is unset.
fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let building_for_windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !building_for_windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        warn("videoboost needs FFmpeg: set FFMPEG_DIR, or install FFmpeg with vcpkg and set VCPKG_ROOT.");
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| String::from("x64-windows"));
    let candidate = PathBuf::from(vcpkg_root).join("installed").join(triplet);

    if !candidate.is_dir() {
        warn(&format!(
            "No vcpkg FFmpeg found under {}; set FFMPEG_DIR explicitly.",
            candidate.display()
        ));
        return;
    }

    warn(&format!(
        "Found vcpkg FFmpeg at {0}; export FFMPEG_DIR={0} so ffmpeg-sys-next finds it.",
        candidate.display()
    ));
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        warn("Dynamic vcpkg FFmpeg builds also need VCPKGRS_DYNAMIC=1.");
    }
}
