use log::{error, info};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use warp::Filter;

use snap_grid::config::Config;
use snap_grid::db::{self, SqlitePhotoStore};
use snap_grid::handlers_collage::build_collage_routes;
use snap_grid::handlers_health::build_health_routes;
use snap_grid::handlers_photo::build_photo_routes;
use snap_grid::warp_helpers::{cors, handle_rejection, SharedStore};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let address = SocketAddr::new(config.host.parse::<IpAddr>()?, config.port);

    info!("Starting SnapGrid server on {}", address);
    info!("Database: {}", config.db_path);
    info!("Logo: {}", config.logo);

    if !is_port_available(address) {
        error!(
            "Port {} is already in use. Stop the other SnapGrid instance or set SNAP_GRID_PORT.",
            config.port
        );
        return Err(format!("Port {} is already in use", config.port).into());
    }

    let db_pool = db::create_db_pool(&config.db_path, config.max_connections).await?;
    let store: SharedStore = Arc::new(SqlitePhotoStore::new(db_pool.clone()));
    let card_id = db::card_id(store.as_ref()).await?;
    info!("Card {} initialized", card_id);

    let exporter = Arc::new(config.build_exporter().await?);

    let routes = build_health_routes(db_pool)
        .or(build_photo_routes(
            store.clone(),
            exporter.clone(),
            config.crop_options(),
            config.max_upload_bytes(),
        ))
        .or(build_collage_routes(store, exporter))
        .with(cors())
        .with(warp::log("snap_grid"))
        .recover(handle_rejection);

    info!("Server started, listening on http://{}", address);

    warp::serve(routes).run(address).await;

    Ok(())
}

fn is_port_available(address: SocketAddr) -> bool {
    TcpListener::bind(address).is_ok()
}
