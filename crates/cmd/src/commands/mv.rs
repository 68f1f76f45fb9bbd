use anyhow::{Context, Result};

use crate::common::FsContext;

pub async fn mv_command(ctx: &FsContext, from: &str, to: &str) -> Result<()> {
    let fs = ctx.open().await?;
    fs.move_item(from, to)
        .await
        .with_context(|| format!("moving {from} to {to}"))
}
