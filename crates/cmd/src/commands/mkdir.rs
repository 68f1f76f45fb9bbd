use anyhow::{Context, Result};
use diagnostics::{debug, info};

use crate::common::FsContext;

pub async fn mkdir_command(ctx: &FsContext, path: &str) -> Result<()> {
    debug!("creating directory {path}", path: path);

    let fs = ctx.open().await?;
    fs.create_folder(path)
        .await
        .with_context(|| format!("creating {path}"))?;

    info!("directory created: {path}", path: path);
    Ok(())
}
