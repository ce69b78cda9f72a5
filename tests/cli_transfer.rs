//! End-to-end smoke test driving the `lanshare` binary itself: one `serve`
//! process and one `send` process over real loopback sockets, matching the
//! teacher's convention of exercising binaries as subprocesses under
//! top-level `tests/` rather than only unit-testing their library code.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::tempdir;

struct ServeGuard(Child);

impl Drop for ServeGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_lanshare"))
}

#[test]
fn send_over_loopback_is_received_by_a_serving_peer() {
    let recv_dir = tempdir().unwrap();
    let send_dir = tempdir().unwrap();
    let file_path = send_dir.path().join("note.txt");
    std::fs::write(&file_path, b"hello over the wire").unwrap();

    let port = "58701";

    let serve = Command::new(bin())
        .args(["--root", recv_dir.path().to_str().unwrap(), "--port", port, "serve"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn serve");
    let _serve_guard = ServeGuard(serve);

    std::thread::sleep(Duration::from_millis(200));

    let status = Command::new(bin())
        .args([
            "--root",
            send_dir.path().to_str().unwrap(),
            "--port",
            port,
            "send",
            file_path.to_str().unwrap(),
            "--peer",
            "127.0.0.1",
        ])
        .stdin(Stdio::null())
        .status()
        .expect("run send");
    assert!(status.success());

    let received_path = recv_dir.path().join("note.txt");
    let mut found = false;
    for _ in 0..50 {
        if received_path.exists() {
            found = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(found, "receiver never wrote note.txt");
    assert_eq!(std::fs::read(&received_path).unwrap(), b"hello over the wire");
}
