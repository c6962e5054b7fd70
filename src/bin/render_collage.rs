use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Instant;

use snap_grid::config::Config;
use snap_grid::db::{self, SqlitePhotoStore};
use snap_grid::export::{self, Artifact, DirectoryShare, FileCaptionSink, ShareSession};

const USAGE: &str = "Usage: render-collage [--labels] [--no-labels] [--share] [OUTPUT_DIR]";

struct Args {
    labels: Option<bool>,
    share: bool,
    output_dir: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        labels: None,
        share: false,
        output_dir: PathBuf::from("."),
    };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--labels" => args.labels = Some(true),
            "--no-labels" => args.labels = Some(false),
            "--share" => args.share = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("Unknown option {}\n{}", flag, USAGE),
            dir => args.output_dir = PathBuf::from(dir),
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let pool = db::create_db_pool(&config.db_path, config.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_path))?;
    let store = SqlitePhotoStore::new(pool);
    let exporter = config
        .build_exporter()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let start = Instant::now();
    let options = exporter.options(args.labels);
    let result = exporter.export(&store, &options).await?;
    let artifact = Artifact::collage(&result);
    println!(
        "Rendered {}x{} collage in {:.2?} (sha256 {})",
        result.width,
        result.height,
        start.elapsed(),
        result.digest()
    );

    if args.share {
        tokio::fs::create_dir_all(&args.output_dir).await?;
        let mut session = ShareSession::new(exporter.caption());
        session
            .copy_caption(&FileCaptionSink::new(args.output_dir.join("caption.txt")))
            .await?;
        session
            .share(&artifact, &DirectoryShare::new(&args.output_dir))
            .await?;
        println!("Shared to {}", args.output_dir.display());
    } else {
        let path = export::save_to_dir(&artifact, &args.output_dir).await?;
        println!("Saved {}", path.display());
    }

    Ok(())
}
