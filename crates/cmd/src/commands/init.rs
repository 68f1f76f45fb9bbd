use std::io::Write;

use anyhow::Result;

use crate::common::FsContext;

/// Bootstrap the tree: legacy migration, default directories and any
/// interrupted moves
pub async fn init_command<W: Write>(ctx: &FsContext, out: &mut W) -> Result<()> {
    let fs = ctx.open().await?;
    let config = fs.config();
    writeln!(out, "root:  {}", config.root.display())?;
    writeln!(out, "state: {}", config.state_dir.display())?;
    Ok(())
}
