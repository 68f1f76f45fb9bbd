use anyhow::{Context, Result};

use crate::common::FsContext;

pub async fn rm_command(ctx: &FsContext, path: &str) -> Result<()> {
    let fs = ctx.open().await?;
    fs.delete(path)
        .await
        .with_context(|| format!("removing {path}"))
}
