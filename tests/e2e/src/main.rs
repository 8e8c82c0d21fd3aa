fn main() {
    println!("Run `cargo test -p e2e` to execute end-to-end transfer tests.");
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::SinkExt;
    use tokio::net::TcpStream;
    use tokio_util::codec::Framed;

    use dirship_protocol::{ChunkCodec, ChunkMessage};
    use dirship_receiver::{ReceiverConfig, ReceiverServer};
    use dirship_uploader::{UploadConfig, UploadError, upload};

    /// Starts a receiver on an OS-assigned port and waits until it is bound.
    async fn start_receiver(root: &Path) -> (Arc<ReceiverServer>, tokio::task::JoinHandle<()>, u16) {
        let server = ReceiverServer::new(ReceiverConfig {
            port: 0,
            working_root: root.to_path_buf(),
        });
        let runner = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            runner.run().await.unwrap();
        });
        let mut port = 0;
        for _ in 0..100 {
            port = server.port().await;
            if port > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(port > 0, "receiver should have bound");
        (server, handle, port)
    }

    /// Builds the canonical upload fixture: a 500 byte file, an empty file
    /// in a subdirectory, and an empty subdirectory.
    fn make_source(parent: &Path, name: &str) -> std::path::PathBuf {
        let dir = parent.join(name);
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::create_dir_all(dir.join("sub2")).unwrap();
        std::fs::write(dir.join("a.txt"), vec![b'x'; 500]).unwrap();
        std::fs::write(dir.join("sub").join("b.txt"), b"").unwrap();
        dir
    }

    /// Polls until `check` passes or the deadline expires.
    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within deadline");
    }

    #[tokio::test]
    async fn upload_replaces_existing_remote_directory() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();

        // Pre-existing remote tree that the upload must replace.
        let live = remote.path().join("live");
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(live.join("old.txt"), b"stale").unwrap();

        let source = make_source(local.path(), "payload");
        let (server, handle, port) = start_receiver(remote.path()).await;

        let config = UploadConfig::new("127.0.0.1", port, "live");
        let report = upload(&source, &config).await.unwrap();
        assert!(report.bytes_sent > 0);
        assert!(report.source_deleted);
        assert!(!source.exists(), "source directory should be removed");

        wait_for(|| live.join("a.txt").is_file()).await;
        assert_eq!(std::fs::read(live.join("a.txt")).unwrap(), vec![b'x'; 500]);
        assert_eq!(
            std::fs::read(live.join("sub").join("b.txt")).unwrap(),
            b""
        );
        assert!(live.join("sub2").is_dir());
        assert!(!live.join("old.txt").exists(), "old contents must be gone");

        // No staging leftovers in the working root.
        let leftovers: Vec<_> = std::fs::read_dir(remote.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != "live")
            .collect();
        assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");

        server.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn upload_installs_when_target_absent() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let source = make_source(local.path(), "fresh");
        let (server, handle, port) = start_receiver(remote.path()).await;

        let mut config = UploadConfig::new("127.0.0.1", port, "brand-new");
        config.delete_source = false;
        upload(&source, &config).await.unwrap();
        assert!(source.exists(), "keep-source upload must not delete");

        let installed = remote.path().join("brand-new");
        wait_for(|| installed.join("a.txt").is_file()).await;
        assert!(installed.join("sub2").is_dir());

        server.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn upload_with_tiny_chunks_arrives_intact() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let source = make_source(local.path(), "tiny");
        let (server, handle, port) = start_receiver(remote.path()).await;

        let mut config = UploadConfig::new("127.0.0.1", port, "live");
        config.chunk_size = 7;
        upload(&source, &config).await.unwrap();

        let live = remote.path().join("live");
        wait_for(|| live.join("a.txt").is_file()).await;
        assert_eq!(std::fs::read(live.join("a.txt")).unwrap(), vec![b'x'; 500]);

        server.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn upload_without_receiver_keeps_source() {
        let local = tempfile::tempdir().unwrap();
        let source = make_source(local.path(), "stranded");

        // Port 1 is never listening.
        let config = UploadConfig::new("127.0.0.1", 1, "live");
        let err = upload(&source, &config).await.unwrap_err();
        assert!(matches!(err, UploadError::Transport(_)));
        assert!(source.exists(), "failed upload must leave the source alone");
    }

    /// The swap must not happen until the finishing message arrives, no
    /// matter how many data frames have been written.
    #[tokio::test]
    async fn swap_waits_for_finishing_message() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();

        let live = remote.path().join("live");
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(live.join("old.txt"), b"stale").unwrap();

        let source = make_source(local.path(), "staged");
        let mut tar_bytes = Vec::new();
        dirship_archive::pack(&source, &mut tar_bytes).unwrap();

        let (server, handle, port) = start_receiver(remote.path()).await;
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut framed = Framed::new(stream, ChunkCodec);

        // Stream the archive in blocks without finishing.
        for (i, block) in tar_bytes.chunks(1024).enumerate() {
            framed
                .send(ChunkMessage::data("staged.tar", (i * 1024) as u64, block))
                .await
                .unwrap();
        }
        wait_for(|| {
            remote
                .path()
                .join("staged.tar")
                .metadata()
                .map(|m| m.len() == tar_bytes.len() as u64)
                .unwrap_or(false)
        })
        .await;
        assert!(
            live.join("old.txt").is_file(),
            "target must be untouched before the finishing message"
        );
        assert!(!live.join("a.txt").exists());

        framed
            .send(ChunkMessage::finish("staged.tar", "staged", "live"))
            .await
            .unwrap();
        wait_for(|| live.join("a.txt").is_file()).await;
        assert!(!live.join("old.txt").exists());
        assert!(!remote.path().join("staged.tar").exists());

        server.shutdown();
        handle.await.unwrap();
    }
}
