use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use dog_publish::memory::{
    MemoryMediaGateway, MemoryNoticeSink, MemoryPostStore, MemoryPublishGateway, MemorySearchIndex,
};
use dog_publish::prelude::*;
use dog_publish::CoordinatorEvent;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = Arc::new(MemoryPostStore::new());
    let media = Arc::new(MemoryMediaGateway::new(store.clone()));
    let publisher = Arc::new(MemoryPublishGateway::new(store.clone()));
    let notices = Arc::new(MemoryNoticeSink::new());
    let index = Arc::new(MemorySearchIndex::new());

    let coordinator =
        PostCoordinator::with_config(store.clone(), media.clone(), publisher.clone(), CoordinatorConfig::from_env())
            .with_video_resolver(media.clone())
            .with_notice_sink(notices.clone())
            .with_search_indexer(index.clone());

    let mut events = coordinator.observability().event_stream();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Event log skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let worker = coordinator.start().await?;

    // A post with one asset of each kind, all still on the device
    let photo = Media::image(PostId::new()).with_id("photo").with_size(1024, 768);
    let clip = Media::video(PostId::new()).with_id("clip");
    let menu = Media::document(PostId::new()).with_id("menu");
    let post = Post::new()
        .with_title("Weekend in Lisbon")
        .with_status(PostStatus::Publish)
        .with_content(concat!(
            r#"<p>Tram 28 at dawn.</p><img data-wp_upload_id="photo" src="file:///photos/tram.jpg">"#,
            r#"<video data-wp_upload_id="clip" src="file:///videos/tram.mov"></video>"#,
            r#"<p>The <a data-wp_upload_id="menu" href="file:///docs/menu.pdf">menu</a> we ate from.</p>"#
        ))
        .with_media(photo)
        .with_media(clip)
        .with_media(menu);
    store.insert(post.clone());

    let outcome = coordinator.save(&post, false).await?;
    info!("Save returned: {:?}", outcome);

    // Simulated upload subsystem finishing one asset at a time
    tokio::time::sleep(Duration::from_millis(100)).await;
    media.complete_upload(&MediaId::from("photo"), "https://cdn.example/2024/tram.jpg", 101)?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    media.set_video_url(&MediaId::from("clip"), "https://videos.example/tram.mp4");
    media.complete_upload(&MediaId::from("clip"), "https://cdn.example/2024/tram.mov", 102)?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    media.complete_upload(&MediaId::from("menu"), "https://cdn.example/2024/menu.pdf", 103)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    if let Some(published) = store.snapshot(&post.id) {
        info!("Final remote status: {}", published.remote_status.name());
        info!("Final content: {}", published.content.unwrap_or_default());
    }

    // A draft whose only image failed, left behind by a previous run
    let stranded = Post::new()
        .with_title("Half written")
        .with_remote_status(RemoteStatus::Failed)
        .with_media(Media::image(PostId::new()).with_id("stranded").with_status(MediaRemoteStatus::Failed));
    store.insert(stranded.clone());

    let summary = coordinator.resume().await?;
    info!("Resume retried {} posts, skipped {}", summary.retried.len(), summary.skipped.len());
    media.complete_upload(&MediaId::from("stranded"), "https://cdn.example/2024/draft.jpg", 104)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let metrics = coordinator.observability().metrics().snapshot();
    info!("Metrics: {}", serde_json::to_string(&metrics)?);
    info!("Indexed posts: {}", index.indexed().len());
    for notice in notices.notices() {
        info!("Notice: {} ({})", notice.title, notice.message);
    }

    worker.shutdown().await?;
    Ok(())
}

fn log_event(event: &CoordinatorEvent) {
    info!(
        post_id = %event.post_id(),
        at = %event.timestamp(),
        "event: {}",
        event.event_name()
    );
}
