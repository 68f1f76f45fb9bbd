use anyhow::{Context, Result};

use crate::common::FsContext;

pub async fn write_command(ctx: &FsContext, path: &str, content: &str) -> Result<()> {
    let fs = ctx.open().await?;
    fs.write_file(path, content)
        .await
        .with_context(|| format!("writing {path}"))?;
    diagnostics::info!("wrote {len} bytes to {path}", len: content.len(), path: path);
    Ok(())
}
