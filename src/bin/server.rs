use anyhow::Context;
use tracing::Level;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let level = Some(Level::DEBUG);
    #[cfg(not(debug_assertions))]
    let level = Some(Level::INFO);

    let r = lms_backend::create(level)
        .await
        .context("unable to initialize backend")?;

    if let Err(e) = r.launch().await {
        tracing::error!("Error launching server: {}", e);
        anyhow::bail!("server stopped unexpectedly");
    }

    Ok(())
}
