use std::{env, sync::Arc};

use auxbox_collab::{Collab, CollabConfig, MemoryDatabase};
use auxbox_server::{init_logger, run_server};

#[tokio::main]
async fn main() {
    init_logger();

    let config = CollabConfig {
        youtube_api_key: env::var("AUXBOX_YOUTUBE_API_KEY").unwrap_or_default(),
        ..Default::default()
    };

    let collab = Arc::new(Collab::new(MemoryDatabase::new(), config));

    collab.init().await.expect("collab initializes");
    run_server(collab).await;
}
