use log::{error, info, LevelFilter};
use std::env;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use touch_guard::config::SessionConfig;
use touch_guard::embedding::PixelEmbedder;
use touch_guard::frame::{DirectoryFrameSource, FrameSource};
use touch_guard::knn::KnnStore;
use touch_guard::logging::init_logging;
use touch_guard::{default_alert_sink, Session};

const CONFIG_FILE: &str = "touch_guard.toml";

/// Trains on two image folders, then watches a third:
/// `cargo run --example replay -- <hands_down_dir> <hand_on_face_dir> <live_dir>`
#[tokio::main]
async fn main() {
    init_logging(LevelFilter::Debug);

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 3 {
        error!("Usage: replay <hands_down_dir> <hand_on_face_dir> <live_dir>");
        return;
    }

    let config = SessionConfig::load_or_default(Path::new(CONFIG_FILE));
    let alerts = match default_alert_sink(&config) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Alert sink unavailable: {}", e);
            return;
        }
    };
    let store = KnnStore::new(config.knn_k);
    let mut session = Session::new(
        config,
        DirectoryFrameSource::new(&args[0]),
        PixelEmbedder::default(),
        store,
        alerts,
    );

    if let Err(e) = session.start() {
        error!("Can't start: {}", e);
        return;
    }
    if let Err(e) = session.begin_negative_training().await {
        error!("Negative training failed: {}", e);
        return;
    }

    session.frames_mut().switch_to(&args[1]);
    if let Err(e) = session.frames_mut().acquire() {
        error!("Can't open {}: {}", args[1], e);
        return;
    }
    if let Err(e) = session.begin_positive_training().await {
        error!("Positive training failed: {}", e);
        return;
    }

    session.frames_mut().switch_to(&args[2]);
    if let Err(e) = session.frames_mut().acquire() {
        error!("Can't open {}: {}", args[2], e);
        return;
    }

    let stop = CancellationToken::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Stopping");
        ctrl_c.cancel();
    });

    match session.run_inference(stop).await {
        Ok(Some(summary)) => info!("Done: {:?}", summary),
        Ok(None) => error!("Session was not ready for inference"),
        Err(e) => error!("Inference failed: {}", e),
    }
}
