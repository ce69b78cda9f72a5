//! End-to-end test driving two `Fleet`s (acceptor + discovery + sessions)
//! over a real loopback TCP socket.

use engine::Fleet;
use protocol::{ConflictPrompt, ConflictResolution, Folder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

#[derive(Clone)]
struct RealFolder(PathBuf);

impl Folder for RealFolder {
    type Sub = Self;

    fn get_or_create_sub(&self, name: &str) -> std::io::Result<Self::Sub> {
        let path = self.0.join(name);
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn get_or_create_file(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.0.join(name);
        if !path.exists() {
            std::fs::File::create(&path)?;
        }
        Ok(path)
    }

    fn delete_file(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.0.join(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.0.join(name).exists()
    }

    fn create_file(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.0.join(name);
        std::fs::File::create(&path)?;
        Ok(path)
    }
}

struct AlwaysRename;
impl ConflictPrompt for AlwaysRename {
    fn resolve(&self, _candidate: &str) -> ConflictResolution {
        ConflictResolution::Rename
    }
}

#[tokio::test]
async fn two_fleets_transfer_a_file_end_to_end() {
    let send_dir = tempdir().unwrap();
    let recv_dir = tempdir().unwrap();
    let file_path = send_dir.path().join("report.pdf");
    let payload = vec![11u8; 200_000];
    tokio::fs::write(&file_path, &payload).await.unwrap();

    let receiver_fleet = Arc::new(Fleet::new(
        RealFolder(recv_dir.path().to_path_buf()),
        ".transfers_in_progress",
        "",
        Arc::new(AlwaysRename),
    ));
    let sender_fleet = Arc::new(Fleet::new(
        RealFolder(send_dir.path().to_path_buf()),
        ".transfers_in_progress",
        "",
        Arc::new(AlwaysRename),
    ));

    let port = 58_600;
    receiver_fleet.start(port).unwrap();

    let peer = SocketAddr::from(([127, 0, 0, 1], port));
    sender_fleet
        .start_outgoing(&file_path, peer)
        .await
        .unwrap();

    let received_path = recv_dir.path().join("report.pdf");
    for _ in 0..300 {
        if tokio::fs::metadata(&received_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
            == payload.len() as u64
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let received = tokio::fs::read(&received_path).await.unwrap();
    assert_eq!(received, payload);

    receiver_fleet.stop();
    sender_fleet.stop();
}
