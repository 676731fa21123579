use std::path::Path;

use stash_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_binaries()?;
    ensure_env_present(&[
        "REDIS_URL",
        "R2_ENDPOINT_URL",
        "R2_ACCESS_KEY_ID",
        "R2_SECRET_ACCESS_KEY",
        "R2_BUCKET_NAME",
    ])?;
    ensure_any_env_present(&["GCP_PROJECT_ID", "FIREBASE_PROJECT_ID"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

/// The work dir must exist and be writable.
async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::Builder::new()
        .prefix("selfcheck-")
        .tempfile_in(path)
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}

fn ensure_binaries() -> anyhow::Result<()> {
    let ffmpeg = stash_media::check_ffmpeg()?;
    let ffprobe = stash_media::check_ffprobe()?;
    println!(
        "worker-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).map_or(true, |v| v.trim().is_empty()) {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}

fn ensure_any_env_present(vars: &[&str]) -> anyhow::Result<()> {
    if vars
        .iter()
        .any(|var| std::env::var(var).is_ok_and(|v| !v.trim().is_empty()))
    {
        Ok(())
    } else {
        Err(anyhow::anyhow!("set one of {}", vars.join(", ")))
    }
}
