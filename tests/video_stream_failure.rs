//! Runs the video pipeline against stand-in `ffmpeg`/`ffprobe` scripts that fail mid-stream.
//!
//! This binary rewrites `PATH`, so it holds exactly one test.
#![cfg(unix)]

use std::{os::unix::fs::PermissionsExt as _, path::Path, sync::Arc, time::Duration};

use framelab::{
    ArtifactNamer, ErrorKind, MediaKind, Session, SourceCatalog, SourceEntry, TransformParams,
    VideoPipeline,
};

// The decoder floods stderr well past a pipe buffer, emits one 2x2 RGB frame, then a
// truncated one. The encoder writes a marker into its output file and swallows stdin.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
case "$*" in
  *-version*) echo "ffmpeg version 0-stand-in"; exit 0 ;;
  *pipe:1*)
    head -c 200000 /dev/zero | tr '\0' x >&2
    head -c 12 /dev/zero
    head -c 5 /dev/zero
    exit 1 ;;
  *pipe:0*)
    printf partial > "$last"
    cat > /dev/null
    exit 0 ;;
esac
exit 1
"#;

const FAKE_FFPROBE: &str = r#"#!/bin/sh
case "$*" in
  *-version*) echo "ffprobe version 0-stand-in"; exit 0 ;;
esac
echo '{"streams":[{"width":2,"height":2,"r_frame_rate":"25/1","avg_frame_rate":"25/1"}]}'
"#;

fn install_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn mid_stream_failure_returns_error_and_keeps_partial_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    install_script(&bin, "ffmpeg", FAKE_FFMPEG);
    install_script(&bin, "ffprobe", FAKE_FFPROBE);

    let path = std::env::var_os("PATH").unwrap_or_default();
    let mut dirs = vec![bin.clone()];
    dirs.extend(std::env::split_paths(&path));
    let joined = std::env::join_paths(dirs).unwrap();
    // SAFETY: the only test in this binary, run before any other thread reads the env.
    unsafe { std::env::set_var("PATH", joined) };

    let clip = dir.path().join("traffic.mp4");
    std::fs::write(&clip, b"stand-in container").unwrap();
    let catalog =
        SourceCatalog::new([SourceEntry::new("traffic", MediaKind::Video, &clip)]).unwrap();
    let out_dir = dir.path().join("out");
    let namer = Arc::new(ArtifactNamer::new(&out_dir, "png", "mp4").unwrap());
    let pipeline = VideoPipeline::new(namer, TransformParams::default());
    let session = Session::new(Arc::new(catalog), "traffic").unwrap();

    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(pipeline.process_with_stats(&session, "grayscale"));
    });
    let result = rx
        .recv_timeout(Duration::from_secs(30))
        .expect("video pipeline did not return after a mid-stream failure");

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceReadFailure);
    assert!(err.to_string().contains("truncated frame 1"));

    let written: Vec<_> = std::fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);
    let name = written[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("grayscale_") && name.ends_with(".mp4"));
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"partial");
}
